use std::collections::HashMap;
use std::sync::Arc;

use crate::node::Node;
use crate::template::{Template, TemplateError};

/// Interns template descriptions per call site.
///
/// The first request for a site builds and validates the description; later
/// requests return the same `Arc`, so renders from one site stay compatible
/// with each other while renders from different sites never are.
#[derive(Default)]
pub struct TemplateRegistry {
    templates: HashMap<Arc<str>, Arc<Template>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_insert_with(
        &mut self,
        site: &str,
        describe: impl FnOnce() -> Node,
    ) -> Result<Arc<Template>, TemplateError> {
        if let Some(template) = self.templates.get(site) {
            return Ok(template.clone());
        }
        let template = Template::new(describe())?;
        self.templates.insert(site.into(), template.clone());
        Ok(template)
    }

    pub fn get(&self, site: &str) -> Option<&Arc<Template>> {
        self.templates.get(site)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
