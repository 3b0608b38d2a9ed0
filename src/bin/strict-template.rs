use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use portal_solutions_strict_template::{LoaderOptions, load};
use tracing_subscriber::EnvFilter;

/// Compile an underscore template into a CommonJS module that never uses `with`.
#[derive(Parser, Debug)]
#[command(name = "strict-template", version)]
struct Args {
    /// Template file to compile.
    input: PathBuf,

    /// Write the module here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Loader options as a query string (`?globals[]=x&addFilenameComment`) or `?{json}`.
    #[arg(short, long)]
    query: Option<String>,

    /// Extra global names that are never prefixed.
    #[arg(short, long = "global", value_delimiter = ',')]
    globals: Vec<String>,

    /// Prepend an HTML comment naming the template.
    #[arg(long)]
    add_filename_comment: bool,

    /// Lower ES2015+ syntax in template code to ES5 before rewriting.
    #[arg(long)]
    es2015: bool,

    /// Name used in the filename comment; defaults to the input path.
    #[arg(long)]
    resource: Option<String>,
}

/// Logs go to stderr, and only when `STRICT_TEMPLATE_LOG` or `RUST_LOG` is set.
fn init_tracing() {
    let filter = match std::env::var("STRICT_TEMPLATE_LOG") {
        Ok(val) => EnvFilter::builder().parse_lossy(val),
        Err(_) if std::env::var("RUST_LOG").is_ok() => EnvFilter::from_default_env(),
        Err(_) => return,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Loader options from `--query`, with the individual flags layered on top.
fn loader_options(args: &Args) -> anyhow::Result<LoaderOptions> {
    let mut options = match &args.query {
        Some(q) => LoaderOptions::from_query(q).context("parsing --query")?,
        None => LoaderOptions::default(),
    };
    if !args.globals.is_empty() {
        options.add_globals(args.globals.iter().cloned());
    }
    options.add_filename_comment |= args.add_filename_comment;
    if args.es2015 && options.secondary_transform.is_none() {
        options.secondary_transform = Some(serde_json::json!({}));
    }
    Ok(options)
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let options = loader_options(&args)?;

    let content = std::fs::read_to_string(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let resource = args
        .resource
        .clone()
        .unwrap_or_else(|| args.input.display().to_string());
    let module = load(&content, &resource, &options)
        .with_context(|| format!("compiling {}", args.input.display()))?;

    match &args.output {
        Some(path) => std::fs::write(path, module)
            .with_context(|| format!("writing {}", path.display()))?,
        None => print!("{module}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(argv: &[&str]) -> LoaderOptions {
        let args = Args::try_parse_from([&["strict-template", "t.jst"][..], argv].concat()).unwrap();
        loader_options(&args).unwrap()
    }

    #[test]
    fn flags_extend_the_query() {
        let options = options(&["-q", "?globals[]=a", "-g", "b,c", "--add-filename-comment"]);
        assert_eq!(options.globals(), ["a", "b", "c"]);
        assert!(options.add_filename_comment);
        assert!(options.secondary_transform.is_none());
    }

    #[test]
    fn es2015_flag_defaults_the_transform() {
        let options = options(&["--es2015"]);
        assert_eq!(options.secondary_transform, Some(serde_json::json!({})));
        let out = load("<% xs.map(x => x) %>", "t.jst", &options).unwrap();
        assert!(!out.contains("=>"), "{out}");
        assert!(out.contains("data.xs.map("), "{out}");
    }

    #[test]
    fn es2015_flag_keeps_a_queried_transform() {
        let options = options(&["--es2015", "-q", r#"?{"babel":{"presets":[]}}"#]);
        assert_eq!(
            options.secondary_transform,
            Some(serde_json::json!({"presets": []}))
        );
    }

    #[test]
    fn bad_queries_are_reported() {
        let args = Args::try_parse_from(["strict-template", "t.jst", "-q", "?{not json"]).unwrap();
        assert!(loader_options(&args).is_err());
    }
}
