use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::bail;
use keygate_core::{hash_secret, normalize_identity, SessionIssuer, Settings, SystemClock};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: keygate hash | keygate issue <identity> | keygate verify <token>";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    /// Read a secret from stdin and print its digest.
    Hash,
    /// Mint a session token for an identity.
    Issue(String),
    /// Validate a token and print its claims.
    Verify(String),
}

impl Command {
    fn parse(args: &[String]) -> anyhow::Result<Self> {
        match args {
            [cmd] if cmd == "hash" => Ok(Self::Hash),
            [cmd, identity] if cmd == "issue" => Ok(Self::Issue(identity.clone())),
            [cmd, token] if cmd == "verify" => Ok(Self::Verify(token.clone())),
            _ => bail!(USAGE),
        }
    }
}

fn issuer() -> anyhow::Result<SessionIssuer> {
    let settings = Settings::from_env()?;
    Ok(SessionIssuer::new(&settings.session, Arc::new(SystemClock)))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keygate=info,keygate_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    match Command::parse(&args)? {
        Command::Hash => {
            eprint!("Enter password: ");
            io::stderr().flush()?;

            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            // Only the line terminator goes; surrounding spaces are part of the secret.
            let password = line.trim_end_matches(['\r', '\n']);

            if password.is_empty() {
                bail!("Password cannot be empty");
            }

            println!("{}", hash_secret(password)?);
        }
        Command::Issue(identity) => {
            let issuance = issuer()?.issue(&normalize_identity(&identity))?;
            tracing::info!("Issued token for {} (expires at {})", issuance.identity, issuance.expires_at);
            println!("{}", issuance.token);
        }
        Command::Verify(token) => {
            let claims = issuer()?.verify(&token)?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
    }

    Ok(())
}
