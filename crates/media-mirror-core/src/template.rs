/// Rename template for destination container names. `{name}` is replaced
/// with the source name; a template without the placeholder maps every
/// source name to the same destination name, which is almost certainly a
/// mistake, so construction warns about it.
#[derive(Debug, Clone)]
pub struct NameTemplate(String);

impl NameTemplate {
    pub fn new(template: &str) -> Self {
        if !template.contains("{name}") {
            tracing::warn!(
                "Rename template '{}' has no {{name}} placeholder; every container will map to the same name",
                template
            );
        }
        Self(template.to_string())
    }

    pub fn apply(&self, name: &str) -> String {
        self.0.replace("{name}", name)
    }

    pub fn is_identity(&self) -> bool {
        self.0 == "{name}"
    }
}

impl Default for NameTemplate {
    fn default() -> Self {
        Self("{name}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_source_name() {
        let template = NameTemplate::new("Mirrored - {name}");
        assert_eq!(template.apply("Friday Films"), "Mirrored - Friday Films");
    }

    #[test]
    fn default_is_identity() {
        let template = NameTemplate::default();
        assert!(template.is_identity());
        assert_eq!(template.apply("As Is"), "As Is");
    }
}
