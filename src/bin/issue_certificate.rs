//! Issue a single certificate PDF
//!
//! Runs the full pipeline (hash, render, placeholder, sign) against an
//! in-memory store seeded from the command line.
//!
//! Usage:
//!   cargo run --bin issue_certificate -- --first-name Test --last-name User \
//!       --type "NIDCAP Professional" --issue-date 2024-01-15 --issuer "Test Center" \
//!       [--stamp stamp.png] [--output certificate.pdf]
//!
//! Signing credentials, secret key and uploads directory come from the
//! environment (`SIGNING_CERT_PATH`, `SIGNING_CERT_PASSPHRASE`, `SECRET_KEY`,
//! `UPLOADS_DIR`, `CERT_DEGRADED_POLICY`).

use cert_oxide::{
    CertificatePipeline, CertificationRecord, Holder, IssuingCenter, MemoryStore, PipelineConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;

const HOLDER_ID: &str = "cli-holder";
const CENTER_ID: &str = "cli-center";
const CERTIFICATION_ID: &str = "cli-certification";

struct IssueArgs {
    first_name: String,
    last_name: String,
    certification_type: String,
    issue_date: String,
    issuer: Option<String>,
    stamp: Option<String>,
    output: Option<PathBuf>,
}

impl IssueArgs {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        Self::parse(&args)
    }

    fn parse(args: &[String]) -> Result<Self, String> {
        let mut first_name = None;
        let mut last_name = None;
        let mut certification_type = None;
        let mut issue_date = None;
        let mut issuer = None;
        let mut stamp = None;
        let mut output = None;

        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            let value = args.get(i + 1).cloned();
            match flag {
                "--first-name" => first_name = value,
                "--last-name" => last_name = value,
                "--type" => certification_type = value,
                "--issue-date" => issue_date = value,
                "--issuer" => issuer = value,
                "--stamp" => stamp = value,
                "--output" | "-o" => output = value.map(PathBuf::from),
                "--help" | "-h" => return Err(usage()),
                other => return Err(format!("unknown argument: {}\n{}", other, usage())),
            }
            i += 2;
        }

        let required = |value: Option<String>, flag: &str| value.ok_or_else(|| format!("missing {}\n{}", flag, usage()));
        Ok(Self {
            first_name: required(first_name, "--first-name")?,
            last_name: required(last_name, "--last-name")?,
            certification_type: required(certification_type, "--type")?,
            issue_date: required(issue_date, "--issue-date")?,
            issuer,
            stamp,
            output,
        })
    }
}

fn usage() -> String {
    "usage: issue_certificate --first-name NAME --last-name NAME --type TYPE --issue-date DATE \
     [--issuer NAME] [--stamp FILE] [--output FILE]"
        .to_string()
}

fn seed_store(args: &IssueArgs) -> cert_oxide::Result<MemoryStore> {
    let store = MemoryStore::new();
    store.insert_holder(Holder::new(HOLDER_ID, &args.first_name, &args.last_name))?;

    let mut record = CertificationRecord::new(
        CERTIFICATION_ID,
        HOLDER_ID,
        &args.certification_type,
        &args.issue_date,
    );
    if let Some(issuer) = &args.issuer {
        store.insert_center(IssuingCenter {
            id: CENTER_ID.to_string(),
            name: issuer.clone(),
            stamp_url: args.stamp.clone(),
        })?;
        record = record.with_issuing_center(CENTER_ID);
    }
    store.insert_certification(record)?;
    Ok(store)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = match IssueArgs::from_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            return ExitCode::from(2);
        },
    };

    let result = seed_store(&args).and_then(|store| {
        let pipeline = CertificatePipeline::new(PipelineConfig::from_env())?;
        let issued = pipeline.issue_for_holder(&store, CERTIFICATION_ID, HOLDER_ID)?;
        let output = args
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(&issued.filename));
        std::fs::write(&output, issued.document())?;
        Ok((issued, output))
    });

    match result {
        Ok((issued, output)) => {
            println!("Wrote {} ({} bytes)", output.display(), issued.document().len());
            println!("Signature hash: {}", issued.signature_hash);
            match issued.degraded_reason() {
                None => println!("Signed: yes"),
                Some(reason) => println!("Signed: NO ({})", reason),
            }
            ExitCode::SUCCESS
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        },
    }
}
