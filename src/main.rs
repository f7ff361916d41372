use anyhow::Result;
use clap::Parser;
use coldchain_assistant::config::Settings;
use coldchain_assistant::orchestrator::Orchestrator;
use tracing::info;

#[derive(Parser)]
#[command(name = "coldchain-assistant")]
#[command(about = "Natural-language Q&A over cold-chain logistics data")]
struct Args {
    /// The question in natural language
    question: String,

    /// LLM API key (or set LLM_API_KEY env var)
    #[arg(long)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut settings = Settings::from_env();
    if args.api_key.is_some() {
        settings.llm_api_key = args.api_key;
    }

    info!("Question: {}", args.question);

    let orchestrator = Orchestrator::from_settings(&settings);
    let response = orchestrator.run(&args.question, &[]).await;

    println!("\n[Answer]\n{}", response.text);
    if let Some(sql) = &response.generated_query {
        println!("\n[Generated SQL]\n{}", sql);
    }
    if let Some(rows) = &response.tabular_data {
        println!("\n[Result {} rows]\n{}", rows.row_count(), rows.to_table_string());
    }

    Ok(())
}
