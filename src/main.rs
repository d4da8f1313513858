use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use allergen_guard::advisory::AdvisoryAugmenter;
use allergen_guard::assessment::normalize::normalize;
use allergen_guard::config::{self, APP_VERSION};
use allergen_guard::{
    AllergenKnowledgeBase, AllergyProfile, AssessmentEngine, CartSnapshot,
    DefaultAssessmentEngine, EngineConfig,
};

#[derive(Parser)]
#[command(name = "allergen-guard", version)]
#[command(about = "Allergen conflict and risk assessment for shopping carts", long_about = None)]
struct Cli {
    /// Allergen family table to use instead of the bundled one
    #[arg(long, global = true, env = "ALLERGEN_GUARD_FAMILIES")]
    families: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess a cart against an allergy list
    Assess {
        /// JSON file with "allergies" and "cart" ("-" reads stdin)
        #[arg(long, short)]
        request: PathBuf,
        /// Engine configuration file (default: per-user engine.json if present)
        #[arg(long, short, env = "ALLERGEN_GUARD_CONFIG")]
        config: Option<PathBuf>,
        /// Print match evidence and coverage along with the assessment
        #[arg(long)]
        detailed: bool,
    },
    /// List the allergen families in the knowledge base
    Families,
    /// Show how text is normalized for matching
    Normalize {
        #[arg(required = true)]
        text: Vec<String>,
    },
}

fn main() -> Result<()> {
    allergen_guard::init_tracing();
    let cli = Cli::parse();
    tracing::debug!("{} v{}", config::APP_NAME, APP_VERSION);

    match cli.command {
        Commands::Assess {
            request,
            config,
            detailed,
        } => assess(&request, config.as_deref(), cli.families.as_deref(), detailed)?,
        Commands::Families => families(cli.families.as_deref())?,
        Commands::Normalize { text } => {
            for t in text {
                println!("{t}\t{}", normalize(&t));
            }
        }
    }

    Ok(())
}

fn knowledge_base(path: Option<&Path>) -> Result<Arc<AllergenKnowledgeBase>> {
    let kb = match path {
        Some(path) => Arc::new(AllergenKnowledgeBase::load_file(path)?),
        None => AllergenKnowledgeBase::bundled()?,
    };
    Ok(kb)
}

fn read_request(path: &Path) -> Result<Value> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request {}", path.display()))?
    };
    serde_json::from_str(&text).context("Request is not valid JSON")
}

fn assess(
    request: &Path,
    config_path: Option<&Path>,
    families_path: Option<&Path>,
    detailed: bool,
) -> Result<()> {
    let config = EngineConfig::resolve(config_path)?;
    let reference = knowledge_base(families_path)?;
    let advisory = AdvisoryAugmenter::from_config(&config.advisory)?;
    let engine = DefaultAssessmentEngine::new(reference, config)?;

    let request = read_request(request)?;
    let profile = AllergyProfile::from_json_value(&request, engine.reference());
    let cart = CartSnapshot::from_json_value(request.get("cart").unwrap_or(&Value::Null));

    let mut outcome = engine.assess_cart_detailed(&profile, &cart);
    if let Some(advisory) = &advisory {
        outcome = advisory.augment(&engine, &profile, &cart, outcome);
    }

    let output = if detailed {
        serde_json::to_string_pretty(&outcome)?
    } else {
        serde_json::to_string_pretty(&outcome.assessment)?
    };
    println!("{output}");
    Ok(())
}

fn families(path: Option<&Path>) -> Result<()> {
    let kb = knowledge_base(path)?;
    for family in kb.families() {
        let direct: Vec<&str> = family.direct.iter().map(String::as_str).collect();
        let derivatives: Vec<&str> = family.derivatives.iter().map(String::as_str).collect();
        println!("{}", family.name);
        println!("  direct:      {}", direct.join(", "));
        if !derivatives.is_empty() {
            println!("  derivatives: {}", derivatives.join(", "));
        }
    }
    Ok(())
}
