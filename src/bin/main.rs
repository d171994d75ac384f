use clap::Parser;
use crossterm::style::Stylize;
use pinyin_core::{ConvertOptions, EngineConfig, PinyinEngine, SpecialCharConfig, SpecialCharMode, ToneVariant};
use std::io::{stdin, stdout, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pinyin", version, about = "Interactive Chinese to pinyin converter")]
struct Cli {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dictionary directory, overriding the configured one.
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

struct Session {
    separator: String,
    with_tone: bool,
    mode: Option<SpecialCharMode>,
}

impl Session {
    fn options(&self) -> ConvertOptions {
        let special_chars = match self.mode {
            Some(mode) => SpecialCharConfig::with_mode(mode),
            None => SpecialCharConfig::default(),
        };
        ConvertOptions::default()
            .separator(&self.separator)
            .with_tone(self.with_tone)
            .special_chars(special_chars)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_toml_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = cli.data_dir {
        config.dict.data_dir = dir;
    }

    let engine = PinyinEngine::new(config)?;
    let mut session = Session {
        separator: " ".to_string(),
        with_tone: false,
        mode: None,
    };

    println!("{}", "Chinese to pinyin converter. Type 'exit' to save and quit.".bold());
    println!("Commands: :tone  :sep <s>  :mode <keep|delete|replace>  :slug <text>");
    println!("          :add <key> <pinyin>  :rm <key>  :merge  :stats");
    println!("---------------------------------------------------------------");

    loop {
        print!("{}", "> ".cyan());
        stdout().flush()?;

        let mut input = String::new();
        if stdin().read_line(&mut input)? == 0 {
            break;
        }
        let line = input.trim_end_matches(['\r', '\n']);

        match line.trim() {
            "exit" => break,
            "" => continue,
            ":tone" => {
                session.with_tone = !session.with_tone;
                println!("tone marks {}", if session.with_tone { "on" } else { "off" });
            }
            ":merge" => print_merge(&engine),
            ":stats" => print_stats(&engine),
            cmd if cmd.starts_with(':') => run_command(&engine, &mut session, line.trim_start()),
            _ => println!("{}", engine.convert_with(line, &session.options()).green()),
        }
    }

    println!("\nSaving learned characters...");
    engine.close()?;
    Ok(())
}

fn run_command(engine: &PinyinEngine, session: &mut Session, line: &str) {
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let variant_flag = session.with_tone;
    match cmd {
        ":sep" => {
            // The rest of the line verbatim, so a single space works.
            session.separator = rest.to_string();
            println!("separator set to {:?}", session.separator);
        }
        ":mode" => match rest.trim().parse::<SpecialCharMode>() {
            Ok(mode) => {
                session.mode = Some(mode);
                println!("special characters: {mode:?}");
            }
            Err(e) => println!("{}", e.to_string().red()),
        },
        ":slug" => println!("{}", engine.url_slug(rest.trim(), "-").green()),
        ":add" => {
            let Some((key, pinyin)) = rest.trim().split_once(' ') else {
                println!("{}", "usage: :add <key> <pinyin>".yellow());
                return;
            };
            match engine.add_custom_pinyin(key, pinyin.trim(), variant_flag) {
                Ok(()) => println!("added {key} -> {}", pinyin.trim()),
                Err(e) => println!("{}", e.to_string().red()),
            }
        }
        ":rm" => match engine.remove_custom_pinyin(rest.trim(), variant_flag) {
            Ok(true) => println!("removed {}", rest.trim()),
            Ok(false) => println!("{} is not a custom entry", rest.trim()),
            Err(e) => println!("{}", e.to_string().red()),
        },
        other => println!("{}", format!("unknown command {other}").yellow()),
    }
}

fn print_merge(engine: &PinyinEngine) {
    let report = engine.execute_merge();
    for outcome in &report.succeeded {
        println!("{} merged {} characters", outcome.variant, outcome.merged.len());
    }
    for skip in &report.skipped {
        println!("{} skipped: {:?}", skip.variant, skip.reason);
    }
    for failure in &report.failed {
        println!("{}", format!("{} failed: {}", failure.variant, failure.error).red());
    }
}

fn print_stats(engine: &PinyinEngine) {
    for variant in ToneVariant::ALL {
        let s = engine.stats(variant);
        println!(
            "{}: custom {} | self-learned {} ({} unsaved) | common {} | rare {} | fallback {}",
            variant.to_string().bold(),
            s.custom,
            s.self_learned,
            s.pending,
            s.common,
            s.rare,
            s.fallback
        );
    }
    let cache = engine.cache_stats();
    println!(
        "cache: {}/{} entries, {} hits, {} misses",
        cache.len, cache.capacity, cache.hits, cache.misses
    );
}
