//! `cas resolve` command implementation.
//!
//! Parses an asset URL path offline and prints the key it addresses.

use cas_key::ParsedRequest;
use clap::Args;

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the resolve command.
#[derive(Args)]
pub(crate) struct ResolveArgs {
    /// Request path, percent-encoded as it appears on the wire.
    path: String,
}

impl ResolveArgs {
    /// Execute the resolve command.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not a valid asset path.
    pub(crate) fn execute(&self) -> Result<(), CliError> {
        let output = Output::new();
        if !cas_key::is_asset_path(&self.path) {
            output.warning("Path is outside the asset namespaces and would not be served");
        }

        let parsed = cas_key::parse_encoded(&self.path)?;
        for (label, value) in describe(&parsed) {
            output.field(label, &value);
        }
        Ok(())
    }
}

/// Labelled fields printed for a parsed request.
fn describe(parsed: &ParsedRequest) -> Vec<(&'static str, String)> {
    let key = &parsed.asset_key;
    let course = key.course();
    let mut fields = vec![
        ("org", course.org().to_owned()),
        ("course", course.course().to_owned()),
        ("run", course.run().unwrap_or("-").to_owned()),
        ("kind", key.kind().to_string()),
        ("name", key.name().to_owned()),
        ("path", key.to_path()),
    ];
    if let Some(digest) = &parsed.requested_digest {
        fields.push(("digest", digest.clone()));
        fields.push(("versioned", parsed.versioned_location(digest)));
    }
    fields
}
