//! Command-line interface for xmlrec

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Record schema JSON file
    #[arg(short, long)]
    record_schema: String,

    /// Print the schema's XSD linkage
    #[arg(short, long)]
    linkage: bool,

    /// Print the normalized schema JSON
    #[arg(short, long)]
    dump: bool,
}

#[cfg(feature = "cli")]
fn main() {
    use xmlrec::record::RecordSchema;
    use xmlrec::transducer::RecordReader;

    let args = Args::parse();

    let json = match std::fs::read_to_string(&args.record_schema) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("cannot read {}: {}", args.record_schema, e);
            std::process::exit(1);
        }
    };

    let parsed = serde_json::from_str(&json)
        .map_err(|e| e.to_string())
        .and_then(|value| RecordSchema::from_json(&value).map_err(|e| e.to_string()));

    let schema = match parsed {
        Ok(schema) => schema,
        Err(e) => {
            eprintln!("invalid record schema: {}", e);
            std::process::exit(1);
        }
    };

    println!("xmlrec v{}", xmlrec::VERSION);

    match RecordReader::new(schema.clone()) {
        Ok(reader) => {
            println!("root tag: {}", reader.root_tag());
            if args.linkage {
                if let Ok(property) = reader.xml_schemas() {
                    if let Some(base_uri) = &property.base_uri {
                        println!("base URI: {}", base_uri);
                    }
                    for url in &property.urls {
                        println!("schema URL: {}", url);
                    }
                    for file in &property.files {
                        println!("schema file: {}", file);
                    }
                }
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }

    if args.dump {
        match serde_json::to_string_pretty(&schema.to_json()) {
            Ok(pretty) => println!("{}", pretty),
            Err(e) => {
                eprintln!("cannot serialize schema: {}", e);
                std::process::exit(1);
            }
        }
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
