// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SIMPLIFICATION CLI
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Executa uma análise sobre dois arquivos e imprime o resultado em JSON.
//
// Uso:
//   simplification-cli original.txt simplificado.txt
//   simplification-cli original.txt simplificado.txt --enable-omission
//   simplification-cli a.txt b.txt --salience semantic --weight SL+=0.5 --timeout 10
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use simplification_engine::prelude::*;
use simplification_engine::{create_tokio_runtime, install_panic_hook, load_runtime_config};

/// Argumentos da linha de comando
struct CliArgs {
    source: PathBuf,
    target: PathBuf,
    options: AnalysisOptions,
}

fn usage(program: &str) {
    eprintln!("Simplification CLI v{}", simplification_engine::VERSION);
    eprintln!();
    eprintln!("Uso: {} <original.txt> <simplificado.txt> [opções]", program);
    eprintln!();
    eprintln!("Opções:");
    eprintln!("  --enable-omission             Habilita detecção de omissões (OM+)");
    eprintln!("  --salience <frequency|semantic>  Método de saliência (padrão: frequency)");
    eprintln!("  --weight <CODE=W>             Peso de uma estratégia, 0.0 - 1.0 (repetível)");
    eprintln!("  --timeout <segundos>          Prazo total da análise");
    eprintln!();
    eprintln!("Exemplo:");
    eprintln!("  {} original.txt simples.txt --weight SL+=0.5 --weight RD+=0", program);
}

fn parse_args(args: &[String]) -> anyhow::Result<CliArgs> {
    let mut positional = Vec::new();
    let mut options = AnalysisOptions::default();
    let mut iter = args.iter().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--enable-omission" => options.enable_omission = true,
            "--salience" => {
                let value = iter.next().context("--salience requires a value")?;
                options.salience_method = SalienceMethod::parse(value)
                    .with_context(|| format!("unknown salience method '{}'", value))?;
            }
            "--weight" => {
                let value = iter.next().context("--weight requires CODE=W")?;
                let (code, weight) = value
                    .split_once('=')
                    .with_context(|| format!("invalid weight '{}', expected CODE=W", value))?;
                let weight: f32 = weight
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid weight value in '{}'", value))?;
                // Código desconhecido é rejeitado por `validate`
                options
                    .tag_weights
                    .insert(code.trim().to_string(), TagSetting::weighted(weight));
            }
            "--timeout" => {
                let value = iter.next().context("--timeout requires seconds")?;
                let secs: f64 = value
                    .parse()
                    .with_context(|| format!("invalid timeout '{}'", value))?;
                if !secs.is_finite() || secs <= 0.0 {
                    bail!("timeout must be positive, got {}", value);
                }
                options.timeout = Some(Duration::from_secs_f64(secs));
            }
            flag if flag.starts_with("--") => bail!("unknown option '{}'", flag),
            path => positional.push(PathBuf::from(path)),
        }
    }

    let [source, target]: [PathBuf; 2] = positional
        .try_into()
        .map_err(|found: Vec<PathBuf>| anyhow::anyhow!("expected 2 files, got {}", found.len()))?;

    Ok(CliArgs {
        source,
        target,
        options,
    })
}

async fn run(args: CliArgs) -> anyhow::Result<()> {
    let source = tokio::fs::read_to_string(&args.source)
        .await
        .with_context(|| format!("reading {}", args.source.display()))?;
    let target = tokio::fs::read_to_string(&args.target)
        .await
        .with_context(|| format!("reading {}", args.target.display()))?;

    let engine = SimplificationEngine::from_config(&EngineConfig::from_env());
    let result = engine.analyze(&source, &target, &args.options).await?;

    for degradation in &result.degradations {
        log::warn!(
            "[cli] ⚠️ {:?} in {}: {}",
            degradation.kind,
            degradation.component,
            degradation.message
        );
    }

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // .env antes de qualquer leitura de configuração
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("⚠ Erro ao carregar .env: {}", e);
        }
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let argv: Vec<String> = std::env::args().collect();
    if argv.len() < 3 {
        usage(argv.first().map(String::as_str).unwrap_or("simplification-cli"));
        std::process::exit(1);
    }
    let args = parse_args(&argv)?;

    install_panic_hook();
    let runtime = create_tokio_runtime(&load_runtime_config()).context("creating tokio runtime")?;
    runtime.block_on(run(args))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        std::iter::once("simplification-cli")
            .chain(items.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_full_args() {
        let args = parse_args(&argv(&[
            "a.txt",
            "b.txt",
            "--enable-omission",
            "--salience",
            "semantic",
            "--weight",
            "SL+=0.5",
            "--timeout",
            "2.5",
        ]))
        .unwrap();

        assert_eq!(args.source, PathBuf::from("a.txt"));
        assert_eq!(args.target, PathBuf::from("b.txt"));
        assert!(args.options.enable_omission);
        assert_eq!(args.options.salience_method, SalienceMethod::Semantic);
        assert_eq!(args.options.tag_weights["SL+"].weight, 0.5);
        assert_eq!(args.options.timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_args(&argv(&["a.txt"])).is_err());
        assert!(parse_args(&argv(&["a.txt", "b.txt", "--weight", "SL+"])).is_err());
        assert!(parse_args(&argv(&["a.txt", "b.txt", "--salience", "magic"])).is_err());
        assert!(parse_args(&argv(&["a.txt", "b.txt", "--timeout", "-1"])).is_err());
        assert!(parse_args(&argv(&["a.txt", "b.txt", "--verbose"])).is_err());
    }
}
