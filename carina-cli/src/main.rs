use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use env_logger::Env;
use log::debug;

use carina_core::provider::Provider;
use carina_core::resource::{Resource, ResourceId, State, Value};
use carina_core::verify::{self, VerifyError};
use carina_provider_aws::{AwsProvider, ProviderConfig, validate_template_arn};
use carina_state::{BackendConfig, LocalBackend, ResourceState, StateFile, create_backend};

#[derive(Parser)]
#[command(name = "carina")]
#[command(about = "Read AWS data sources and verify tracked resources", long_about = None)]
struct Cli {
    /// AWS region (e.g., us-east-1 or aws.Region.us_east_1)
    #[arg(long, global = true)]
    region: Option<String>,

    /// Named AWS profile
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Endpoint override (e.g., a local emulator)
    #[arg(long, global = true)]
    endpoint_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a data source and print its attributes
    Data {
        /// Data source type (e.g., imagebuilder.distribution_configurations)
        resource_type: String,

        /// Filter as name=value1,value2 (repeatable)
        #[arg(long = "filter", value_name = "NAME=VALUES")]
        filters: Vec<String>,
    },
    /// Read a managed resource by identifier
    Read {
        /// Resource type (e.g., sns.topic)
        resource_type: String,

        /// Remote identifier (e.g., an ARN)
        identifier: String,

        /// Extra lookup attribute as key=value (repeatable)
        #[arg(long = "attr", value_name = "KEY=VALUE")]
        attrs: Vec<String>,
    },
    /// Read a managed resource and record it in the state file
    Track {
        /// Resource type (e.g., sns.topic)
        resource_type: String,

        /// Name to record the resource under
        name: String,

        /// Remote identifier (e.g., an ARN)
        identifier: String,

        /// Extra lookup attribute as key=value (repeatable)
        #[arg(long = "attr", value_name = "KEY=VALUE")]
        attrs: Vec<String>,

        /// Path to the state file
        #[arg(long, default_value = LocalBackend::DEFAULT_STATE_FILE)]
        state: PathBuf,
    },
    /// Verify tracked resources against AWS
    Verify {
        #[command(subcommand)]
        command: VerifyCommands,
    },
    /// Validate an ACM PCA certificate template ARN
    ValidateArn {
        /// Template ARN (e.g., arn:aws:acm-pca:::template/EndEntityCertificate/V1)
        arn: String,
    },
}

#[derive(Subcommand)]
enum VerifyCommands {
    /// Check that every tracked resource exists
    Exists {
        #[command(flatten)]
        selection: Selection,
    },
    /// Check that no tracked resource exists anymore
    Destroyed {
        #[command(flatten)]
        selection: Selection,
    },
}

#[derive(clap::Args)]
struct Selection {
    /// Path to the state file
    #[arg(long, default_value = LocalBackend::DEFAULT_STATE_FILE)]
    state: PathBuf,

    /// Only check resources of this type
    #[arg(long = "type")]
    resource_type: Option<String>,

    /// Only check resources with this name
    #[arg(long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = provider_config(&cli);

    let result = match cli.command {
        Commands::Data {
            resource_type,
            filters,
        } => run_data(&config, &resource_type, &filters).await,
        Commands::Read {
            resource_type,
            identifier,
            attrs,
        } => run_read(&config, &resource_type, &identifier, &attrs).await,
        Commands::Track {
            resource_type,
            name,
            identifier,
            attrs,
            state,
        } => run_track(&config, &resource_type, &name, &identifier, &attrs, &state).await,
        Commands::Verify { command } => match command {
            VerifyCommands::Exists { selection } => run_verify_exists(&config, &selection).await,
            VerifyCommands::Destroyed { selection } => {
                run_verify_destroyed(&config, &selection).await
            }
        },
        Commands::ValidateArn { arn } => run_validate_arn(&arn),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn provider_config(cli: &Cli) -> ProviderConfig {
    let mut config = ProviderConfig::new();
    if let Some(region) = &cli.region {
        config = config.with_region(region);
    }
    if let Some(profile) = &cli.profile {
        config = config.with_profile(profile);
    }
    if let Some(endpoint_url) = &cli.endpoint_url {
        config = config.with_endpoint_url(endpoint_url);
    }
    config
}

async fn get_provider(config: &ProviderConfig) -> Result<AwsProvider, String> {
    AwsProvider::new(config).await.map_err(|e| e.to_string())
}

// =============================================================================
// Argument Parsing
// =============================================================================

/// Parse `name=v1,v2` into a filter block
fn parse_filter(raw: &str) -> Result<Value, String> {
    let (name, values) = raw
        .split_once('=')
        .ok_or_else(|| format!("Invalid filter '{}': expected NAME=VALUE[,VALUE...]", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("Invalid filter '{}': name is empty", raw));
    }

    let values: Vec<&str> = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        return Err(format!("Invalid filter '{}': no values", raw));
    }

    Ok(Value::Map(HashMap::from([
        ("name".to_string(), Value::String(name.to_string())),
        ("values".to_string(), Value::string_list(values)),
    ])))
}

/// Parse repeated `key=value` arguments
fn parse_attrs(raw: &[String]) -> Result<HashMap<String, Value>, String> {
    raw.iter()
        .map(|arg| {
            let (key, value) = arg
                .split_once('=')
                .ok_or_else(|| format!("Invalid attribute '{}': expected KEY=VALUE", arg))?;
            if key.is_empty() {
                return Err(format!("Invalid attribute '{}': key is empty", arg));
            }
            Ok((key.to_string(), Value::String(value.to_string())))
        })
        .collect()
}

// =============================================================================
// Output
// =============================================================================

fn state_to_json(state: &State) -> serde_json::Value {
    let attributes: serde_json::Map<String, serde_json::Value> = state
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();

    serde_json::json!({
        "type": state.id.resource_type,
        "name": state.id.name,
        "identifier": state.identifier,
        "exists": state.exists,
        "attributes": attributes,
    })
}

fn print_state(state: &State) -> Result<(), String> {
    let json = serde_json::to_string_pretty(&state_to_json(state))
        .map_err(|e| format!("Failed to serialize output: {}", e))?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// Commands
// =============================================================================

async fn run_data(config: &ProviderConfig, resource_type: &str, filters: &[String]) -> Result<(), String> {
    let mut resource = Resource::new(resource_type, "cli").with_read_only(true);
    if !filters.is_empty() {
        let blocks = filters
            .iter()
            .map(|f| parse_filter(f))
            .collect::<Result<Vec<_>, _>>()?;
        resource = resource.with_attribute("filter", Value::List(blocks));
    }

    let provider = get_provider(config).await?;
    let state = provider
        .read_data_source(&resource)
        .await
        .map_err(|e| e.to_string())?;
    print_state(&state)
}

async fn run_read(
    config: &ProviderConfig,
    resource_type: &str,
    identifier: &str,
    attrs: &[String],
) -> Result<(), String> {
    let attributes = parse_attrs(attrs)?;
    let provider = get_provider(config).await?;
    let id = ResourceId::new(resource_type, "cli");

    let state = provider
        .read(&id, identifier, &attributes)
        .await
        .map_err(|e| e.to_string())?;
    if !state.exists {
        return Err(format!("{} ({}) does not exist", resource_type, identifier));
    }
    print_state(&state)
}

async fn run_track(
    config: &ProviderConfig,
    resource_type: &str,
    name: &str,
    identifier: &str,
    attrs: &[String],
    state_path: &Path,
) -> Result<(), String> {
    let attributes = parse_attrs(attrs)?;
    let provider = get_provider(config).await?;
    let id = ResourceId::new(resource_type, name);

    let state = provider
        .read(&id, identifier, &attributes)
        .await
        .map_err(|e| e.to_string())?;
    if !state.exists {
        return Err(format!("{} ({}) does not exist", resource_type, identifier));
    }

    let backend = create_backend(&BackendConfig::local(state_path.display().to_string()))
        .map_err(|e| e.to_string())?;
    let mut state_file = backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default();

    let mut tracked = ResourceState::from_state(provider.name(), &state);
    // Lookup attributes are needed again at verification time
    for (key, value) in &attributes {
        tracked
            .attributes
            .entry(key.clone())
            .or_insert_with(|| value.to_json());
    }
    state_file.upsert_resource(tracked);
    state_file.increment_serial();
    backend
        .write_state(&state_file)
        .await
        .map_err(|e| e.to_string())?;

    println!(
        "{} Tracking {} as {}",
        "✓".green(),
        identifier,
        id.to_string().bold()
    );
    Ok(())
}

/// Load tracked resources matching the selection
async fn load_tracked(selection: &Selection) -> Result<Vec<State>, String> {
    let backend = create_backend(&BackendConfig::local(
        selection.state.display().to_string(),
    ))
    .map_err(|e| e.to_string())?;
    let state_file: StateFile = backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("No state file at {}", selection.state.display()))?;

    let tracked: Vec<State> = state_file
        .select(selection.resource_type.as_deref(), selection.name.as_deref())
        .map(ResourceState::to_state)
        .collect();
    debug!(
        "{} tracked resources selected from {}",
        tracked.len(),
        selection.state.display()
    );
    Ok(tracked)
}

/// Distinct resource types in first-seen order
fn resource_types(tracked: &[State]) -> Vec<String> {
    let mut types: Vec<String> = Vec::new();
    for state in tracked {
        if !types.contains(&state.id.resource_type) {
            types.push(state.id.resource_type.clone());
        }
    }
    types
}

async fn run_verify_exists(config: &ProviderConfig, selection: &Selection) -> Result<(), String> {
    let tracked = load_tracked(selection).await?;
    if tracked.is_empty() {
        println!("{}", "No tracked resources selected.".yellow());
        return Ok(());
    }

    let provider = get_provider(config).await?;
    let mut failures = 0;

    println!("{}", "Verifying resources exist...".cyan().bold());
    println!();
    for state in &tracked {
        let Some(checker) = provider.existence_check(&state.id.resource_type) else {
            println!(
                "  {} {} - no existence check for this type",
                "-".yellow(),
                state.id
            );
            continue;
        };

        match verify::assert_exists(checker.as_ref(), state).await {
            Ok(_) => println!("  {} {}", "✓".green(), state.id),
            Err(e) => {
                failures += 1;
                println!("  {} {} - {}", "✗".red(), state.id, e);
            }
        }
    }
    println!();

    if failures > 0 {
        return Err(format!("{} of {} resources failed verification", failures, tracked.len()));
    }
    println!(
        "{}",
        format!("All {} resources exist.", tracked.len()).green().bold()
    );
    Ok(())
}

async fn run_verify_destroyed(
    config: &ProviderConfig,
    selection: &Selection,
) -> Result<(), String> {
    let tracked = load_tracked(selection).await?;
    if tracked.is_empty() {
        println!("{}", "No tracked resources selected.".yellow());
        return Ok(());
    }

    let provider = get_provider(config).await?;
    let mut failures = 0;

    println!("{}", "Verifying resources are destroyed...".cyan().bold());
    println!();
    for resource_type in resource_types(&tracked) {
        let Some(checker) = provider.existence_check(&resource_type) else {
            println!(
                "  {} {} - no existence check for this type",
                "-".yellow(),
                resource_type
            );
            continue;
        };

        match verify::assert_destroyed(checker.as_ref(), &tracked).await {
            Ok(()) => println!("  {} {}", "✓".green(), resource_type),
            Err(e @ VerifyError::StillExists { .. }) => {
                failures += 1;
                println!("  {} {}", "✗".red(), e);
            }
            Err(e) => {
                failures += 1;
                println!("  {} {} - {}", "✗".red(), resource_type, e);
            }
        }
    }
    println!();

    if failures > 0 {
        return Err(format!("{} resource types failed destroy verification", failures));
    }
    println!("{}", "All selected resources are destroyed.".green().bold());
    Ok(())
}

fn run_validate_arn(arn: &str) -> Result<(), String> {
    validate_template_arn(arn).map_err(|e| e.to_string())?;
    println!("{} {}", "✓".green(), arn);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_filter_splits_values() {
        let value = parse_filter("name=web, api").unwrap();
        let Value::Map(map) = value else {
            panic!("Expected map");
        };
        assert_eq!(map.get("name"), Some(&Value::String("name".to_string())));
        assert_eq!(map.get("values"), Some(&Value::string_list(["web", "api"])));
    }

    #[test]
    fn parse_filter_rejects_malformed_input() {
        assert!(parse_filter("name").is_err());
        assert!(parse_filter("=web").is_err());
        assert!(parse_filter("name=").is_err());
        assert!(parse_filter("name=,").is_err());
    }

    #[test]
    fn parsed_filters_feed_filter_spec() {
        let blocks = vec![
            parse_filter("name=a,b").unwrap(),
            parse_filter("name=b,c").unwrap(),
        ];
        let spec = carina_core::filter::FilterSpec::from_value(&Value::List(blocks)).unwrap();
        let wire = spec.wire_filters();
        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0].values, vec!["a", "b", "c"]);
    }

    #[test]
    fn parse_attrs_keeps_values_verbatim() {
        let attrs = parse_attrs(&["certificate_authority_arn=arn:aws:acm-pca:x=y".to_string()])
            .unwrap();
        assert_eq!(
            attrs.get("certificate_authority_arn"),
            Some(&Value::String("arn:aws:acm-pca:x=y".to_string()))
        );
        assert!(parse_attrs(&["novalue".to_string()]).is_err());
        assert!(parse_attrs(&["=x".to_string()]).is_err());
    }

    #[test]
    fn state_json_shape() {
        let state = State::existing(
            ResourceId::new("imagebuilder.distribution_configurations", "cli"),
            HashMap::from([("names".to_string(), Value::string_list(["a"]))]),
        )
        .with_identifier("us-east-1");

        let json = state_to_json(&state);
        assert_eq!(json["identifier"], "us-east-1");
        assert_eq!(json["exists"], true);
        assert_eq!(json["attributes"]["names"], serde_json::json!(["a"]));
    }

    #[test]
    fn resource_types_are_distinct_in_order() {
        let tracked = vec![
            State::existing(ResourceId::new("sns.topic", "a"), HashMap::new()),
            State::existing(ResourceId::new("acmpca.certificate", "b"), HashMap::new()),
            State::existing(ResourceId::new("sns.topic", "c"), HashMap::new()),
        ];
        assert_eq!(
            resource_types(&tracked),
            vec!["sns.topic".to_string(), "acmpca.certificate".to_string()]
        );
    }

    #[test]
    fn global_flags_build_provider_config() {
        let cli = Cli::parse_from([
            "carina",
            "validate-arn",
            "arn:aws:acm-pca:::template/EndEntityCertificate/V1",
            "--region",
            "aws.Region.eu_west_1",
            "--endpoint-url",
            "http://localhost:4566",
        ]);
        let config = provider_config(&cli);
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:4566"));
        assert_eq!(config.profile, None);
    }

    #[test]
    fn verify_flags_parse() {
        let cli = Cli::parse_from([
            "carina",
            "verify",
            "destroyed",
            "--state",
            "dev.state.json",
            "--type",
            "sns.topic",
        ]);
        let Commands::Verify {
            command: VerifyCommands::Destroyed { selection },
        } = cli.command
        else {
            panic!("Expected verify destroyed");
        };
        assert_eq!(selection.state, PathBuf::from("dev.state.json"));
        assert_eq!(selection.resource_type.as_deref(), Some("sns.topic"));
        assert_eq!(selection.name, None);
    }

    #[test]
    fn validate_arn_command() {
        assert!(run_validate_arn("arn:aws:acm-pca:::template/EndEntityCertificate/V1").is_ok());
        assert!(run_validate_arn("arn:aws:acm-pca:us-east-1::template/EndEntityCertificate/V1").is_err());
    }
}
