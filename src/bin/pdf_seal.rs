//! Prepare, embed and inspect PDF signatures from the command line
//!
//! Usage:
//!   pdf_seal prepare <in.pdf> <out.pdf> [--placeholder out.json] [--name N] [--reason R]
//!                    [--location L] [--contact C] [--field F] [--capacity BYTES]
//!                    [--digest sha256] [--rect llx,lly,urx,ury]
//!   pdf_seal embed <prepared.pdf> <placeholder.json> <signature.der> <out.pdf>
//!   pdf_seal inspect <file.pdf>
//!
//! `prepare` prints the digest to hand to the signer as hex. Set `RUST_LOG=debug`
//! to trace the pipeline stages.

use chrono::Local;
use pdf_seal::config::SigningConfig;
use pdf_seal::signatures::{
    bytes_to_hex, embed_signature, finalize_byte_range, inspect_signatures, DigestAlgorithm, PdfSigner,
    SignaturePlaceholder, SignatureVisibility, SignerMetadata,
};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

struct PrepareConfig {
    input: PathBuf,
    output: PathBuf,
    placeholder: PathBuf,
    signing: SigningConfig,
    metadata: SignerMetadata,
}

impl PrepareConfig {
    fn from_args(args: &[String]) -> Result<Self, String> {
        let mut positional = Vec::new();
        let mut placeholder = None;
        let mut signing = SigningConfig::default();
        let mut metadata = SignerMetadata::new().with_signing_time(Local::now().fixed_offset());

        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            if !flag.starts_with("--") {
                positional.push(PathBuf::from(flag));
                i += 1;
                continue;
            }
            i += 1;
            let value = args.get(i).ok_or_else(|| format!("{} needs a value", flag))?;
            match flag {
                "--placeholder" => placeholder = Some(PathBuf::from(value)),
                "--name" => metadata = metadata.with_name(value.as_str()),
                "--reason" => metadata = metadata.with_reason(value.as_str()),
                "--location" => metadata = metadata.with_location(value.as_str()),
                "--contact" => metadata = metadata.with_contact_info(value.as_str()),
                "--field" => signing = signing.with_field_name(value.as_str()),
                "--capacity" => {
                    let bytes = value.parse().map_err(|_| format!("invalid capacity: {}", value))?;
                    signing = signing.with_reserved_signature_bytes(bytes);
                },
                "--digest" => {
                    let algorithm =
                        DigestAlgorithm::from_name(value).ok_or_else(|| format!("unknown digest: {}", value))?;
                    signing = signing.with_digest_algorithm(algorithm);
                },
                "--rect" => signing = signing.with_visibility(parse_rect(value)?),
                _ => return Err(format!("unknown option: {}", flag)),
            }
            i += 1;
        }

        let [input, output]: [PathBuf; 2] = positional
            .try_into()
            .map_err(|_| "prepare needs <in.pdf> <out.pdf>".to_string())?;
        let placeholder = placeholder.unwrap_or_else(|| output.with_extension("placeholder.json"));
        Ok(Self {
            input,
            output,
            placeholder,
            signing,
            metadata,
        })
    }
}

fn parse_rect(value: &str) -> Result<SignatureVisibility, String> {
    let numbers: Vec<f64> = value
        .split(',')
        .map(|n| n.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| format!("invalid rect: {}", value))?;
    let rect: [f64; 4] = numbers
        .try_into()
        .map_err(|_| format!("rect needs four numbers: {}", value))?;
    Ok(SignatureVisibility::Visible { rect })
}

fn prepare(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let config = PrepareConfig::from_args(args)?;
    let original = fs::read(&config.input)?;
    let signer = PdfSigner::new(config.signing);
    let prepared = signer.prepare(&original, &config.metadata)?;

    fs::write(&config.output, &prepared.document.bytes)?;
    fs::write(&config.placeholder, serde_json::to_vec_pretty(&prepared.document.placeholder)?)?;

    eprintln!("Prepared:    {}", config.output.display());
    eprintln!("Placeholder: {}", config.placeholder.display());
    eprintln!("ByteRange:   {}", prepared.byte_range);
    eprintln!("Capacity:    {} bytes", prepared.document.placeholder.signature_capacity());
    println!("{}", bytes_to_hex(&prepared.digest));
    Ok(())
}

fn embed(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let [prepared, placeholder, signature, output] = args else {
        return Err("embed needs <prepared.pdf> <placeholder.json> <signature.der> <out.pdf>".into());
    };
    let mut bytes = fs::read(prepared)?;
    let placeholder: SignaturePlaceholder = serde_json::from_slice(&fs::read(placeholder)?)?;
    let signature = fs::read(signature)?;

    embed_signature(&mut bytes, &placeholder, &signature)?;
    let range = finalize_byte_range(&mut bytes, &placeholder)?;
    fs::write(output, &bytes)?;
    eprintln!("Signed {} ({} bytes, ByteRange {})", output, bytes.len(), range);
    Ok(())
}

fn inspect(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let [path] = args else {
        return Err("inspect needs <file.pdf>".into());
    };
    let bytes = fs::read(path)?;
    let reports = inspect_signatures(&bytes)?;
    if reports.is_empty() {
        println!("No signed signature fields");
    }
    for report in &reports {
        println!("Field: {}", report.field_name);
        if let Some(sub_filter) = report.sub_filter {
            println!("  SubFilter:  {}", sub_filter.as_pdf_name());
        }
        match &report.byte_range {
            Some(range) => println!("  ByteRange:  {}", range),
            None => println!("  ByteRange:  missing"),
        }
        println!("  Contents:   {} bytes", report.contents.len());
        let metadata = &report.metadata;
        for (label, value) in [
            ("Name", &metadata.name),
            ("Reason", &metadata.reason),
            ("Location", &metadata.location),
            ("Contact", &metadata.contact_info),
        ] {
            if let Some(value) = value {
                println!("  {:<11} {}", format!("{}:", label), value);
            }
        }
        if let Some(time) = metadata.signing_time {
            println!("  Signed at:  {}", time.to_rfc3339());
        }
        let checks = &report.checks;
        println!(
            "  Structure:  {} (whole file: {})",
            if checks.is_intact() { "intact" } else { "damaged" },
            if checks.covers_whole_file { "yes" } else { "no" }
        );
    }
    Ok(())
}

fn usage() {
    eprintln!("Usage:");
    eprintln!("  pdf_seal prepare <in.pdf> <out.pdf> [options]");
    eprintln!("  pdf_seal embed <prepared.pdf> <placeholder.json> <signature.der> <out.pdf>");
    eprintln!("  pdf_seal inspect <file.pdf>");
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let Some(command) = args.get(1) else {
        usage();
        return ExitCode::FAILURE;
    };
    let rest = &args[2..];
    let result = match command.as_str() {
        "prepare" => prepare(rest),
        "embed" => embed(rest),
        "inspect" => inspect(rest),
        "--help" | "-h" | "help" => {
            usage();
            return ExitCode::SUCCESS;
        },
        other => {
            eprintln!("Error: unknown command {}", other);
            usage();
            return ExitCode::FAILURE;
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        },
    }
}
