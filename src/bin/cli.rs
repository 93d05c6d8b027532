use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ligue1_predictor::config::parse_seasons;
use ligue1_predictor::{run_training, Config, OddsInput, PredictionRequest, Predictor};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ligue1")]
#[command(about = "Train and query the Ligue 1 match outcome model", long_about = None)]
struct Cli {
    /// Model artifact path
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Team stats table path
    #[arg(long, global = true)]
    stats: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build features from match history, train the model and save both artifacts
    Train {
        /// Local CSV with a season column instead of downloading
        #[arg(long)]
        input: Option<PathBuf>,
        /// League code on football-data.co.uk
        #[arg(long)]
        league: Option<String>,
        /// Comma separated seasons, e.g. 2324,2425
        #[arg(long)]
        seasons: Option<String>,
        /// Read and write season files in the cache directory
        #[arg(long)]
        use_cache: bool,
    },
    /// Predict a single match
    Predict {
        /// Home team name
        home: String,
        /// Away team name
        away: String,
        /// Decimal odds for a home win
        #[arg(long, default_value = "2.00")]
        odds_home: String,
        /// Decimal odds for a draw
        #[arg(long, default_value = "3.20")]
        odds_draw: String,
        /// Decimal odds for an away win
        #[arg(long, default_value = "3.00")]
        odds_away: String,
    },
    /// List teams available for prediction
    Teams,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = Config::from_env();

    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if let Some(model) = cli.model {
        config.model_path = model;
    }
    if let Some(stats) = cli.stats {
        config.stats_path = stats;
    }

    match cli.command {
        Commands::Train {
            input,
            league,
            seasons,
            use_cache,
        } => {
            if let Some(league) = league {
                config.league = league;
            }
            if let Some(seasons) = seasons {
                config.seasons = parse_seasons(&seasons);
            }
            config.use_cache |= use_cache;

            println!("Ligue 1 Match Predictor - training\n");
            let summary = run_training(&config, input.as_deref()).await?;
            println!("{}\n", summary.format());
            println!("Model saved to {}", config.model_path.display());
            println!("Team stats saved to {}", config.stats_path.display());
        }
        Commands::Predict {
            home,
            away,
            odds_home,
            odds_draw,
            odds_away,
        } => {
            let predictor = load_predictor(&config)?;
            let request = PredictionRequest {
                home_team: home,
                away_team: away,
                odds_home: OddsInput::Text(odds_home),
                odds_draw: OddsInput::Text(odds_draw),
                odds_away: OddsInput::Text(odds_away),
            };
            let prediction = predictor.predict(&request)?;
            println!("{}", prediction.format());
            if let Some(updated) = predictor.last_update() {
                println!("Last data update: {}", updated.format("%Y-%m-%d %H:%M"));
            }
        }
        Commands::Teams => {
            let predictor = load_predictor(&config)?;
            for team in predictor.teams() {
                println!("{}", team);
            }
        }
    }

    Ok(())
}

fn load_predictor(config: &Config) -> Result<Predictor> {
    Predictor::load(&config.model_path, &config.stats_path).with_context(|| {
        format!(
            "Model or statistics file not found ({} / {}) - run `cli train` first",
            config.model_path.display(),
            config.stats_path.display()
        )
    })
}
