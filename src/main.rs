use clap::Parser;
use vllm_agent_core::{AgentError, Config, LoopController};
use vllm_agent_core::audit::AuditLog;
use vllm_agent_core::constraints::Constraints;
use vllm_agent_core::llm::{OpenAIProvider, ToolRegistry};
use vllm_agent_core::memory::Memory;
use std::io::{self, Write};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "vllm-agent")]
#[command(author, version, about = "Local tool-using assistant driving an OpenAI-compatible chat endpoint", long_about = None)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, default_value = "config.json")]
    config: String,
}

const HELP_TEXT: &str = "\
Reserved words:
  help                      show this message
  clear                     clear the screen
  debug on|off|verbose|basic  change debug verbosity for this session
  config                    print the loaded configuration path
  exit, quit                leave the REPL
Anything else is sent to the assistant as a request.";

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to load config '{}': {}", cli.config, e);
            std::process::exit(1);
        }
    };

    vllm_agent_core::applog::init("app.log");

    let provider: Arc<dyn vllm_agent_core::llm::LLMProvider> = Arc::new(OpenAIProvider::new(
        config.vllm.base_url.clone(),
        config.vllm.model.clone(),
        config.vllm.api_key.clone(),
    ));
    let registry = Arc::new(ToolRegistry::new().register_all_builtin());
    let constraints = Constraints::new(
        config.workspace.dir.clone(),
        config.security.allowed_commands.clone(),
        config.security.timeout_sec,
        config.security.max_output_size,
        config.security.exec_enabled,
    );
    let audit = Arc::new(AuditLog::new(config.audit.log_path.clone()));
    let memory = match Memory::load(config.memory.path.clone()) {
        Ok(m) => Arc::new(m),
        Err(e) => {
            eprintln!("failed to load memory '{}': {}", config.memory.path, e);
            std::process::exit(1);
        }
    };

    let controller = LoopController::new(
        provider,
        registry,
        constraints,
        audit,
        memory,
        config.vllm.temperature,
        config.vllm.max_tokens,
        config.vllm.enable_function_calling,
        config.agent.max_loops,
        config.agent.loop_wait_sec,
    );

    let mut debug_level = if config.debug.enabled {
        config.debug.level.clone().unwrap_or_else(|| "basic".to_string())
    } else {
        "off".to_string()
    };

    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "exit" | "quit" => break,
            "help" => {
                println!("{}", HELP_TEXT);
                continue;
            }
            "clear" => {
                print!("\x1B[2J\x1B[1;1H");
                let _ = io::stdout().flush();
                continue;
            }
            "config" => {
                println!("loaded from: {}", cli.config);
                continue;
            }
            "debug on" => {
                debug_level = "basic".to_string();
                println!("debug: {}", debug_level);
                continue;
            }
            "debug off" => {
                debug_level = "off".to_string();
                println!("debug: {}", debug_level);
                continue;
            }
            "debug verbose" | "debug basic" => {
                debug_level = input.trim_start_matches("debug ").to_string();
                println!("debug: {}", debug_level);
                continue;
            }
            _ => {}
        }

        match controller.run(input).await {
            Ok(response) => println!("{}", response),
            Err(e) => print_error(&e),
        }
    }
}

fn print_error(e: &AgentError) {
    eprintln!("error: {}", e);
}
