use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as _;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use ldap_filter_studio::config::{OutputFormat, ReplConfig, CONFIG_ENV_VAR};
use ldap_filter_studio::diagnostics;
use ldap_filter_studio::parser::Parser;

#[derive(clap::Parser, Debug)]
#[command(
    name = "ldap-filter",
    version,
    about = "LDAP 过滤器分析器 (RFC 4515)",
    after_help = "不带过滤器参数时进入交互模式"
)]
struct Cli {
    /// 要分析的过滤器，例如 "(&(cn=John)(sn=Doe))"
    filters: Vec<String>,

    /// 输出格式，覆盖配置文件中的 output
    #[arg(short = 'o', long = "output", value_enum)]
    output: Option<OutputFormat>,

    /// 配置文件路径，默认读取环境变量或当前目录下的配置
    #[arg(short = 'c', long = "config", value_name = "PATH", env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = ReplConfig::load(cli.config.as_deref()).context("无法加载配置")?;
    if let Some(output) = cli.output {
        config.output = output;
    }
    debug!(?config, "loaded config");

    let mut parser = Parser::new();
    if cli.filters.is_empty() {
        return run_repl(&mut parser, &config);
    }

    let mut all_valid = true;
    for filter in &cli.filters {
        all_valid &= report(&mut parser, filter, &config)?;
    }
    if !all_valid {
        std::process::exit(1);
    }
    Ok(())
}

/// 交互模式：每输入一行就重新分析一次
fn run_repl(parser: &mut Parser, config: &ReplConfig) -> Result<()> {
    let mut editor = DefaultEditor::new().context("无法初始化行编辑器")?;
    if let Some(history) = &config.history_file {
        if let Err(e) = editor.load_history(history) {
            debug!(error = %e, path = %history.display(), "no history loaded");
        }
    }

    println!("--- LDAP 过滤器分析器 (Ctrl-D 退出) ---");
    loop {
        match editor.readline(&config.prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                if let Err(e) = editor.add_history_entry(line.as_str()) {
                    warn!(error = %e, "failed to record history entry");
                }
                report(parser, &line, config)?;
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("读取输入失败"),
        }
    }

    if let Some(history) = &config.history_file {
        editor
            .save_history(history)
            .with_context(|| format!("无法保存历史记录到 {}", history.display()))?;
        info!(path = %history.display(), "saved history");
    }
    Ok(())
}

/// 分析一个过滤器并输出结果，返回它是否有效
fn report(parser: &mut Parser, input: &str, config: &ReplConfig) -> Result<bool> {
    let filter = parser.parse(input);

    match config.output {
        OutputFormat::Tree => println!("{}", diagnostics::outline(filter)),
        OutputFormat::Tokens => {
            for token in filter.tokens() {
                let kind = format!("{:?}", token.kind);
                println!("{:>4} {:<32} {:?}", token.offset(), kind, token.text);
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(filter).context("无法序列化语法树")?;
            println!("{json}");
        }
    }

    let problems = diagnostics::describe(filter);
    if problems.is_empty() && filter.is_valid() {
        println!("✓ 有效的过滤器");
        return Ok(true);
    }

    if config.show_markers {
        let markers = diagnostics::render_markers(input, filter);
        if !markers.is_empty() {
            println!("{input}\n{markers}");
        }
    }
    for problem in &problems {
        println!("✗ {problem}");
    }
    if problems.is_empty() {
        for invalid in filter.invalid_filters() {
            let offset = invalid.start_token.as_ref().map_or(0, |t| t.offset());
            println!("✗ 位置 {offset} 的过滤器不完整");
        }
    }
    Ok(false)
}
