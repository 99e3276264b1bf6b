use clap::{Parser, Subcommand, ValueEnum};
use mockbase::{Record, Registry};
use std::process;

/// Mockbase CLI: inspect and edit a directory of resource definitions
#[derive(Parser)]
#[command(name = "mockbase", version, about)]
struct Cli {
    /// Directory holding the resource definition files
    #[arg(long, default_value = "data")]
    data_dir: String,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Get a single record, with its relationships
    Get {
        /// Resource name
        resource: String,
        /// Record ID
        id: u64,
    },

    /// List every record of a resource, ascending by id
    List {
        /// Resource name
        resource: String,
        /// Skip relationship embedding
        #[arg(long)]
        flat: bool,
    },

    /// Add a new record
    Add {
        /// Resource name
        resource: String,
        /// Field values (e.g. --field name=Alice --field age=30)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
        /// Read the record as a JSON object from a file ("-" for stdin)
        #[arg(long)]
        body: Option<String>,
    },

    /// Replace a record
    Update {
        /// Resource name
        resource: String,
        /// Record ID
        id: u64,
        /// Field values (every declared column)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
        /// Read the record as a JSON object from a file ("-" for stdin)
        #[arg(long)]
        body: Option<String>,
    },

    /// Change some fields of a record
    Patch {
        /// Resource name
        resource: String,
        /// Record ID
        id: u64,
        /// Field values to change (e.g. --field age=31)
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Delete a record and every record that depends on it
    Delete {
        /// Resource name
        resource: String,
        /// Record ID
        id: u64,
        /// Show the record that would be deleted without deleting it
        #[arg(long)]
        dry_run: bool,
    },

    /// Check every stored record against its resource's rules
    Validate,

    /// Show record counts and persistence state per resource
    Status,

    /// Write every changed resource back to its file
    Save,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s.find('=').ok_or_else(|| {
        format!("Invalid key=value pair: no '=' found in '{s}'")
    })?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        // Machine-readable error on stderr
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Registry::load_dir(&cli.data_dir)?;

    match cli.command {
        Command::Get { resource, id } => {
            let record = registry.resource(&resource)?.get(id)?;
            print_output(&record.to_json(), &cli.format)?;
        }

        Command::List { resource, flat } => {
            let handle = registry.resource(&resource)?;
            let mut records = if flat {
                handle.list_unresolved()
            } else {
                handle.list()?
            };
            Record::sort_by_id(&mut records);
            let json: Vec<serde_json::Value> = records.iter().map(Record::to_json).collect();
            print_output(&serde_json::Value::Array(json), &cli.format)?;
        }

        Command::Add {
            resource,
            fields,
            body,
        } => {
            let record = read_record(&fields, body)?;
            let added = registry.resource(&resource)?.add(record)?;
            registry.save_all()?;
            print_output(&added.to_json(), &cli.format)?;
        }

        Command::Update {
            resource,
            id,
            fields,
            body,
        } => {
            let record = read_record(&fields, body)?;
            let updated = registry.resource(&resource)?.update(id, record)?;
            registry.save_all()?;
            print_output(&updated.to_json(), &cli.format)?;
        }

        Command::Patch {
            resource,
            id,
            fields,
        } => {
            let partial = Record::from_json(fields_to_value(&fields))?;
            let patched = registry.resource(&resource)?.update_fields(id, partial)?;
            registry.save_all()?;
            print_output(&patched.to_json(), &cli.format)?;
        }

        Command::Delete {
            resource,
            id,
            dry_run,
        } => {
            let handle = registry.resource(&resource)?;
            if dry_run {
                let record = handle.get(id)?;
                print_output(
                    &serde_json::json!({
                        "dry_run": true,
                        "would_delete": { "resource": resource, "id": id },
                        "record": record.to_json(),
                    }),
                    &cli.format,
                )?;
            } else {
                let existed = handle.delete(id);
                registry.save_all()?;
                print_output(
                    &serde_json::json!({ "ok": true, "deleted": id, "existed": existed }),
                    &cli.format,
                )?;
            }
        }

        Command::Validate => {
            let report = validate_all(&registry)?;
            print_output(&report, &cli.format)?;
        }

        Command::Status => {
            print_output(&registry.status(), &cli.format)?;
        }

        Command::Save => {
            let saved = registry.save_all()?;
            print_output(&serde_json::json!({ "ok": true, "saved": saved }), &cli.format)?;
        }
    }

    Ok(())
}

/// Re-run the write-time rules over every stored record. Loading already
/// enforces them, so this mostly reports what a fresh load would reject.
fn validate_all(registry: &Registry) -> mockbase::Result<serde_json::Value> {
    let mut resources = serde_json::Map::new();
    let mut all_ok = true;

    for name in registry.names() {
        let handle = registry.resource(name)?;
        let mut errors: Vec<String> = Vec::new();
        if let Err(e) = handle.check_global_uniqueness() {
            errors.push(e.to_string());
        }
        for record in handle.list_unresolved() {
            if let Err(e) = handle.validate(&record) {
                errors.push(format!("{}: {e}", record.to_json()));
            }
        }
        all_ok &= errors.is_empty();
        resources.insert(
            name.to_string(),
            serde_json::json!({ "ok": errors.is_empty(), "records": handle.len(), "errors": errors }),
        );
    }

    Ok(serde_json::json!({ "ok": all_ok, "resources": resources }))
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

fn fields_to_value(fields: &[(String, String)]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (key, val) in fields {
        // Try to parse as JSON value (for numbers, booleans, arrays, objects)
        let json_val = serde_json::from_str(val).unwrap_or(serde_json::Value::String(val.clone()));
        map.insert(key.clone(), json_val);
    }
    serde_json::Value::Object(map)
}

/// Build a record from `--body` when given, with any `--field` values layered on top.
fn read_record(
    fields: &[(String, String)],
    body: Option<String>,
) -> Result<Record, Box<dyn std::error::Error>> {
    let mut json = match body {
        Some(path) if path == "-" => {
            use std::io::Read;
            let mut content = String::new();
            std::io::stdin().read_to_string(&mut content)?;
            serde_json::from_str(&content)?
        }
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| format!("Failed to read body file '{path}': {e}"))?;
            serde_json::from_str(&content)?
        }
        None => serde_json::Value::Object(serde_json::Map::new()),
    };

    if let (serde_json::Value::Object(map), serde_json::Value::Object(extra)) =
        (&mut json, fields_to_value(fields))
    {
        map.extend(extra);
    }
    Ok(Record::from_json(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("name=Alice=Bob").unwrap(),
            ("name".to_string(), "Alice=Bob".to_string())
        );
        assert!(parse_key_value("name").is_err());
    }

    #[test]
    fn test_fields_to_value() {
        let fields = vec![
            ("age".to_string(), "30".to_string()),
            ("name".to_string(), "Alice".to_string()),
            ("tags".to_string(), "[\"a\"]".to_string()),
            ("admin".to_string(), "true".to_string()),
        ];
        assert_eq!(
            fields_to_value(&fields),
            json!({ "age": 30, "name": "Alice", "tags": ["a"], "admin": true })
        );
    }

    #[test]
    fn test_read_record_from_fields() {
        let fields = vec![("name".to_string(), "Alice".to_string())];
        let record = read_record(&fields, None).unwrap();
        assert_eq!(record.to_json(), json!({ "name": "Alice" }));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
