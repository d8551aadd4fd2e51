// src/shade/services.rs

//! Provider-registry merging
//!
//! Provider-configuration descriptors from every input archive are
//! accumulated into one registry: service type -> ordered provider list.
//! Both the service type (taken from the descriptor's own path) and each
//! provider line are relocated through the oracle. Provider order is
//! encounter order across archives; duplicates are kept deliberately so
//! the merged registry is the concatenation of its inputs.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::relocate::Relocator;

/// Insertion-ordered mapping from dot-qualified service-type name to
/// provider names.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    order: Vec<String>,
    providers: HashMap<String, Vec<String>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one descriptor. `descriptor_name` is the path component
    /// after the services prefix (the dot-qualified service type);
    /// `content` is the raw descriptor body.
    pub fn merge_descriptor(
        &mut self,
        relocator: &dyn Relocator,
        descriptor_name: &str,
        content: &[u8],
    ) {
        let service_slash = descriptor_name.trim().replace('.', "/");
        let service = match relocator.relocate(&service_slash) {
            Some(relocated) => relocated.replace('/', "."),
            None => service_slash.replace('/', "."),
        };

        let text = String::from_utf8_lossy(content);
        if text.contains('\u{FFFD}') {
            warn!(service = %service, "service descriptor is not valid UTF-8, decoding lossily");
        }

        let mut added = 0usize;
        for line in text.lines() {
            let line = line.trim();
            // Comment and blank lines carry no providers.
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            // A provider the oracle declines to relocate is kept
            // verbatim rather than dropped.
            let provider = match relocator.relocate(&line.replace('.', "/")) {
                Some(relocated) => relocated.replace('/', "."),
                None => line.to_string(),
            };
            self.entry(&service).push(provider);
            added += 1;
        }
        debug!(service = %service, providers = added, "merged service descriptor");
    }

    fn entry(&mut self, service: &str) -> &mut Vec<String> {
        if !self.providers.contains_key(service) {
            self.order.push(service.to_string());
        }
        self.providers.entry(service.to_string()).or_default()
    }

    /// Services and their providers, in first-encounter order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.order.iter().map(|service| {
            (
                service.as_str(),
                self.providers[service].as_slice(),
            )
        })
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }
}
