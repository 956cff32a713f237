use clap::{Arg, Command};
use eml_verdict::config::{load_config, Config};
use eml_verdict::{Analysis, MessageAnalyzer};
use log::LevelFilter;
use std::io::Read;
use std::path::Path;
use std::process;

#[tokio::main]
async fn main() {
    let matches = Command::new("eml-verdict")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Decide whether a raw email message is authentic from its SPF, DKIM and DMARC signals")
        .arg(
            Arg::new("email")
                .value_name("EMAIL")
                .help("Raw message file to analyse (use - for stdin)")
                .required_unless_present("generate-config"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (YAML)"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Write the default configuration file and exit")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the result as JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("details")
                .long("details")
                .help("Include identities and alignment in the output")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging of every pipeline stage")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config = match matches.get_one::<String>("config") {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading configuration: {e:#}");
                process::exit(1);
            }
        },
        None => Config::default(),
    };

    // Initialize logger from the verbose flag or the configured level
    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        config.level_filter().unwrap_or(LevelFilter::Info)
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    let Some(email_file) = matches.get_one::<String>("email") else {
        eprintln!("No message given");
        process::exit(2);
    };

    let raw = match read_message(email_file) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Error reading message: {e:#}");
            process::exit(1);
        }
    };

    let analyzer = match MessageAnalyzer::from_config(&config) {
        Ok(analyzer) => analyzer,
        Err(e) => {
            eprintln!("Error initialising analyzer: {e:#}");
            process::exit(1);
        }
    };

    let analysis = analyzer.analyze_detailed(&raw).await;

    if matches.get_flag("json") {
        let output = if matches.get_flag("details") {
            serde_json::to_string_pretty(&analysis)
        } else {
            serde_json::to_string_pretty(&analysis.report())
        };
        match output {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing result: {e}");
                process::exit(1);
            }
        }
    } else {
        print_analysis(&analysis, matches.get_flag("details"));
    }
}

fn read_message(path: &str) -> anyhow::Result<Vec<u8>> {
    use anyhow::Context;

    if path == "-" {
        let mut raw = Vec::new();
        std::io::stdin()
            .read_to_end(&mut raw)
            .context("Failed to read message from stdin")?;
        return Ok(raw);
    }

    std::fs::read(Path::new(path)).with_context(|| format!("Failed to read {path}"))
}

fn print_analysis(analysis: &Analysis, details: bool) {
    let report = analysis.report();

    println!("Verdict:     {}", report.verdict);
    println!("SPF:         {}", report.spf);
    println!("DKIM:        {}", report.dkim);
    println!("DMARC:       {}", report.dmarc);
    println!("From:        {}", report.from);
    println!("Reply-To:    {}", report.reply_to);
    println!("Return-Path: {}", report.return_path);

    if details {
        let ids = &analysis.identities;
        println!();
        println!("Sending IP:        {}", ids.sending_ip);
        println!("HELO domain:       {}", ids.helo_domain);
        println!("From domain:       {}", ids.from_domain);
        println!("Mail-From domain:  {}", ids.mail_from_domain);
        println!(
            "DKIM signer:       {}",
            ids.dkim_signer_domain.as_deref().unwrap_or(eml_verdict::PLACEHOLDER)
        );
        println!(
            "DMARC policy:      {}",
            analysis
                .dmarc
                .policy
                .map(|p| p.as_str())
                .unwrap_or(eml_verdict::PLACEHOLDER)
        );
        println!("SPF aligned:       {}", analysis.alignment.spf_aligned);
        println!("DKIM aligned:      {}", analysis.alignment.dkim_aligned);
        if !ids.fallbacks.is_empty() {
            println!("Defaults used for: {}", ids.fallbacks.join(", "));
        }
    }
}

fn generate_default_config(path: &str) {
    let yaml = match Config::default().to_yaml() {
        Ok(yaml) => yaml,
        Err(e) => {
            eprintln!("Error generating configuration: {e:#}");
            process::exit(1);
        }
    };

    match std::fs::write(path, yaml) {
        Ok(()) => println!("Default configuration written to: {path}"),
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}
