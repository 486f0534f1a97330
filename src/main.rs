use std::path::Path;

use anyhow::{anyhow, Context as _, Result};
use clap::{Arg, ArgAction, ArgMatches};
use hrefkit::config::Settings;
use hrefkit::http::{Authentication, CacheControl, EntityTag, Preference, QualityItem, WebLink};
use hrefkit::template::{ExpandOptions, MapContext, Template, Value};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

const HEADER_KINDS: [&str; 6] = ["cache-control", "authenticate", "link", "prefer", "etag", "accept"];

fn cli() -> clap::Command {
    clap::Command::new("hrefkit")
        .about("Expand RFC 6570 URI templates and inspect HTTP header values")
        .subcommand_required(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Log debug output to stderr"),
        )
        .subcommand(
            clap::Command::new("expand")
                .about("Expand a template")
                .arg(Arg::new("template").required(true).value_name("TEMPLATE"))
                .arg(
                    Arg::new("var")
                        .long("var")
                        .value_name("NAME=VALUE")
                        .action(ArgAction::Append)
                        .help("Bind a string variable"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .value_name("NAME=JSON")
                        .action(ArgAction::Append)
                        .help("Bind a variable to a JSON value (list, object, null...)"),
                )
                .arg(
                    Arg::new("settings")
                        .short('s')
                        .long("settings")
                        .value_name("SETTINGS")
                        .help("Path to a YAML file with variables and options"),
                )
                .arg(
                    Arg::new("iri")
                        .long("iri")
                        .action(ArgAction::SetTrue)
                        .help("Leave non-ASCII characters unencoded"),
                ),
        )
        .subcommand(
            clap::Command::new("variables")
                .about("List the variables a template references")
                .arg(Arg::new("template").required(true).value_name("TEMPLATE")),
        )
        .subcommand(
            clap::Command::new("header")
                .about("Parse a header value and print it as JSON")
                .arg(
                    Arg::new("kind")
                        .required(true)
                        .value_name("KIND")
                        .value_parser(HEADER_KINDS),
                )
                .arg(Arg::new("text").required(true).value_name("TEXT"))
                .arg(
                    Arg::new("base")
                        .long("base")
                        .value_name("URL")
                        .help("Base URL for resolving relative links"),
                ),
        )
        .subcommand(
            clap::Command::new("etag")
                .about("Generate a strong entity tag for a file or a literal string")
                .arg(Arg::new("input").required(true).value_name("FILE_OR_TEXT")),
        )
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "hrefkit=debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .init();
}

fn split_binding(binding: &str) -> Result<(&str, &str)> {
    binding
        .split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| anyhow!("Expected NAME=VALUE, got '{}'", binding))
}

fn expand(matches: &ArgMatches) -> Result<String> {
    let pattern = matches
        .get_one::<String>("template")
        .ok_or_else(|| anyhow!("Missing template"))?;
    let template = Template::parse(pattern)?;

    let (mut context, options) = match matches.get_one::<String>("settings") {
        Some(path) => {
            let settings = Settings::load(path)?;
            (settings.context()?, settings.expand_options())
        }
        None => (MapContext::new(), ExpandOptions::default()),
    };
    if matches.get_flag("iri") {
        context = context.with_iri(true);
    }

    for binding in matches.get_many::<String>("var").into_iter().flatten() {
        let (name, value) = split_binding(binding)?;
        context.insert(name, value);
    }
    for binding in matches.get_many::<String>("json").into_iter().flatten() {
        let (name, json) = split_binding(binding)?;
        let value: serde_json::Value =
            serde_json::from_str(json).with_context(|| format!("Invalid JSON for variable '{}'", name))?;
        context.insert(name, Value::from(value));
    }

    debug!(variables = context.len(), "bound variables");
    Ok(template.expand_with(&context, &options)?)
}

fn render<T: Serialize + ?Sized>(value: &T, wire: String) -> Result<String> {
    Ok(format!("{}\n{}", serde_json::to_string_pretty(value)?, wire))
}

fn header(matches: &ArgMatches) -> Result<String> {
    let kind = matches
        .get_one::<String>("kind")
        .ok_or_else(|| anyhow!("Missing header kind"))?;
    let text = matches
        .get_one::<String>("text")
        .ok_or_else(|| anyhow!("Missing header text"))?;
    let base = matches
        .get_one::<String>("base")
        .map(|b| Url::parse(b).with_context(|| format!("Invalid base URL '{}'", b)))
        .transpose()?;

    match kind.as_str() {
        "cache-control" => {
            let value = CacheControl::parse(text)?;
            render(&value, value.to_string())
        }
        "authenticate" => {
            let challenges = Authentication::parse_all(text)?;
            render(&challenges, Authentication::to_header(&challenges))
        }
        "link" => {
            let links = WebLink::parse_all(text, base.as_ref())?;
            render(&links, WebLink::to_header(&links))
        }
        "prefer" => {
            let preferences = Preference::parse_all(text)?;
            render(&preferences, Preference::to_header(&preferences))
        }
        "etag" => {
            let tags = EntityTag::parse_list(text)?;
            render(&tags, EntityTag::to_header(&tags))
        }
        "accept" => {
            let items = QualityItem::parse_list(text)?;
            render(&items, QualityItem::to_header(&items))
        }
        other => Err(anyhow!("Unknown header kind '{}'", other)),
    }
}

fn etag(matches: &ArgMatches) -> Result<String> {
    let input = matches
        .get_one::<String>("input")
        .ok_or_else(|| anyhow!("Missing input"))?;
    let path = Path::new(input);
    let material = if path.is_file() {
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?
    } else {
        input.as_bytes().to_vec()
    };
    Ok(EntityTag::generate(&[&material]).to_string())
}

fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("verbose"));

    let output = match matches.subcommand() {
        Some(("expand", sub)) => expand(sub)?,
        Some(("variables", sub)) => {
            let pattern = sub
                .get_one::<String>("template")
                .ok_or_else(|| anyhow!("Missing template"))?;
            Template::parse(pattern)?.variables().join("\n")
        }
        Some(("header", sub)) => header(sub)?,
        Some(("etag", sub)) => etag(sub)?,
        _ => return Err(anyhow!("No subcommand given")),
    };
    println!("{}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_split_binding() {
        assert_eq!(split_binding("a=b=c").unwrap(), ("a", "b=c"));
        assert_eq!(split_binding("empty=").unwrap(), ("empty", ""));
        assert!(split_binding("=x").is_err());
        assert!(split_binding("novalue").is_err());
    }

    #[test]
    fn test_expand_subcommand() {
        let matches = cli().get_matches_from([
            "hrefkit",
            "expand",
            "{/path}{?q,tags}",
            "--var",
            "q=rust uri",
            "--json",
            "path=[\"a\",\"b\"]",
            "--json",
            "tags=null",
        ]);
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(expand(sub).unwrap(), "/a/b?q=rust%20uri");
    }

    #[test]
    fn test_header_subcommand() {
        let matches = cli().get_matches_from(["hrefkit", "header", "prefer", "wait=10, respond-async"]);
        let (_, sub) = matches.subcommand().unwrap();
        let output = header(sub).unwrap();
        assert!(output.contains("\"token\": \"wait\""));
        assert!(output.ends_with("wait=10, respond-async"));
    }

    #[test]
    fn test_etag_of_text() {
        let matches = cli().get_matches_from(["hrefkit", "etag", "hello world"]);
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(
            etag(sub).unwrap(),
            "\"b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9\""
        );
    }
}
