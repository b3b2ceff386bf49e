use std::sync::Arc;

use lazy_static::lazy_static;
use log::{debug, error, info};
use regex::Regex;

use crate::page::{AuthSlot, PageStateReader};

lazy_static! {
    // Matches the field in raw or string-escaped JSON, e.g. `\"idToken\":\"a.b.c\"`
    static ref CREDENTIAL_ID_TOKEN: Regex = Regex::new(
        r#"\\?"idToken\\?"\s*:\s*\\?"([A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+)\\?""#
    )
    .unwrap();
    static ref JWT_PREFIX: Regex = Regex::new(r"eyJ[\w|.]+").unwrap();
}

/// How a token was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStrategy {
    /// Embedded in an inlined script payload
    Credential,
    /// Reassembled from the third-party auth slots
    ThirdParty,
}

/// Finds the page's authentication token
///
/// Strategy A scans inlined scripts; strategy B reassembles the token from
/// the two third-party auth slots. No retries happen here.
#[derive(Clone)]
pub struct TokenLocator {
    page: Arc<dyn PageStateReader>,
}

impl TokenLocator {
    pub fn new(page: Arc<dyn PageStateReader>) -> Self {
        Self { page }
    }

    pub fn locate(&self) -> Option<String> {
        self.locate_with_strategy().map(|(token, _)| token)
    }

    pub fn locate_with_strategy(&self) -> Option<(String, TokenStrategy)> {
        debug!("Searching for idToken...");

        if let Some(token) = find_credential_token(&self.page.script_payloads()) {
            info!("idToken found in inlined script payload");
            debug!("Token: {}...", preview(&token));
            return Some((token, TokenStrategy::Credential));
        }
        info!("Credential idToken not found, checking third-party auth...");

        let prefix = self.page.auth_slot(AuthSlot::Prefix);
        let suffix = self.page.auth_slot(AuthSlot::Suffix);
        if let Some(token) = find_third_party_token(prefix.as_deref(), suffix.as_deref()) {
            info!("idToken found in third-party auth");
            debug!("Token: {}...", preview(&token));
            return Some((token, TokenStrategy::ThirdParty));
        }

        error!("idToken not found");
        None
    }

    pub fn page(&self) -> &Arc<dyn PageStateReader> {
        &self.page
    }
}

/// Return the first `idToken` value embedded in any payload
pub fn find_credential_token<S: AsRef<str>>(payloads: &[S]) -> Option<String> {
    payloads.iter().find_map(|payload| {
        CREDENTIAL_ID_TOKEN
            .captures(payload.as_ref())
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// Concatenate the `eyJ...` prefix found in the first slot with the second slot
pub fn find_third_party_token(prefix_slot: Option<&str>, suffix_slot: Option<&str>) -> Option<String> {
    let prefix = JWT_PREFIX.find(prefix_slot?)?;
    let suffix = suffix_slot?;
    Some(format!("{}{}", prefix.as_str(), suffix))
}

fn preview(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(20)
        .map_or(token.len(), |(i, _)| i);
    &token[..end]
}
