/// Accepted file patterns in the form browsers use for `accept`:
/// `image/*`, `application/pdf`, `.png`. An empty list accepts everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptList {
    patterns: Vec<String>,
}

impl AcceptList {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_ascii_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn accepts(&self, file_name: &str, content_type: Option<&str>) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        let file_name = file_name.to_ascii_lowercase();
        let content_type = content_type.map(str::to_ascii_lowercase);
        self.patterns.iter().any(|pattern| {
            if pattern.starts_with('.') {
                return file_name.ends_with(pattern.as_str());
            }
            let Some(content_type) = content_type.as_deref() else {
                return false;
            };
            match pattern.strip_suffix("/*") {
                Some("*") => true,
                Some(family) => content_type
                    .split_once('/')
                    .is_some_and(|(kind, _)| kind == family),
                None => content_type == pattern,
            }
        })
    }
}
