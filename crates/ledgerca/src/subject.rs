//! Subject names in openssl `-subj` form (`/C=CN/O=MadLedger/CN=peer`).

use std::fmt;

use ledgerca_core::Identity;
use thiserror::Error;

/// Errors raised while parsing a subject.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubjectError {
    #[error("subject must start with '/': {0}")]
    MissingLeadingSlash(String),

    #[error("subject is empty")]
    Empty,

    #[error("subject component '{0}' is not of the form KEY=VALUE")]
    MalformedComponent(String),

    #[error("unsupported subject attribute '{0}' (expected C, ST, L, O, OU or CN)")]
    UnknownAttribute(String),
}

/// Distinguished name attributes accepted in a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Country,
    State,
    Locality,
    Organization,
    OrganizationalUnit,
    CommonName,
}

impl Attribute {
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Country => "C",
            Self::State => "ST",
            Self::Locality => "L",
            Self::Organization => "O",
            Self::OrganizationalUnit => "OU",
            Self::CommonName => "CN",
        }
    }

    fn from_short_name(key: &str) -> Option<Self> {
        match key {
            "C" => Some(Self::Country),
            "ST" => Some(Self::State),
            "L" => Some(Self::Locality),
            "O" => Some(Self::Organization),
            "OU" => Some(Self::OrganizationalUnit),
            "CN" => Some(Self::CommonName),
            _ => None,
        }
    }
}

/// Parsed subject: attributes in the order they were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    attributes: Vec<(Attribute, String)>,
}

impl Subject {
    /// Parse an openssl subject. `\/` escapes a slash inside a value and
    /// attributes with an empty value are skipped, as openssl does.
    pub fn parse(s: &str) -> Result<Self, SubjectError> {
        let body = s
            .strip_prefix('/')
            .ok_or_else(|| SubjectError::MissingLeadingSlash(s.to_string()))?;

        let mut attributes = Vec::new();
        for component in split_unescaped(body) {
            if component.is_empty() {
                continue;
            }
            let (key, value) = component
                .split_once('=')
                .ok_or_else(|| SubjectError::MalformedComponent(component.clone()))?;
            let attribute = Attribute::from_short_name(key.trim())
                .ok_or_else(|| SubjectError::UnknownAttribute(key.trim().to_string()))?;
            if !value.is_empty() {
                attributes.push((attribute, value.to_string()));
            }
        }

        if attributes.is_empty() {
            return Err(SubjectError::Empty);
        }
        Ok(Self { attributes })
    }

    /// Substitute the identity's `{name}` and `{role}` into `template`, then parse.
    pub fn for_identity(template: &str, identity: &Identity) -> Result<Self, SubjectError> {
        Self::parse(&render_template(template, identity))
    }

    pub fn attributes(&self) -> &[(Attribute, String)] {
        &self.attributes
    }

    /// Value of the first occurrence of `attribute`.
    pub fn get(&self, attribute: Attribute) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(a, _)| *a == attribute)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (attribute, value) in &self.attributes {
            write!(f, "/{}={}", attribute.short_name(), value.replace('/', "\\/"))?;
        }
        Ok(())
    }
}

/// Substitute `{name}` and `{role}` placeholders.
pub fn render_template(template: &str, identity: &Identity) -> String {
    template
        .replace("{name}", &identity.name)
        .replace("{role}", identity.role.as_str())
}

fn split_unescaped(body: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next) => current.push(next),
                None => current.push('\\'),
            },
            '/' => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    parts.push(current);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerca_core::Role;

    #[test]
    fn test_parse_default_ca_subject() {
        let subject = Subject::parse("/C=CN/ST=Beijing/L=./O=MadLedger").unwrap();
        assert_eq!(subject.attributes().len(), 4);
        assert_eq!(subject.get(Attribute::Country), Some("CN"));
        assert_eq!(subject.get(Attribute::Locality), Some("."));
        assert_eq!(subject.get(Attribute::Organization), Some("MadLedger"));
        assert_eq!(subject.get(Attribute::CommonName), None);
    }

    #[test]
    fn test_display_round_trips_escapes() {
        let subject = Subject::parse(r"/O=Ledger\/Test/CN=peer").unwrap();
        assert_eq!(subject.get(Attribute::Organization), Some("Ledger/Test"));
        assert_eq!(subject.to_string(), r"/O=Ledger\/Test/CN=peer");
    }

    #[test]
    fn test_skips_empty_values() {
        let subject = Subject::parse("/C=/O=MadLedger/").unwrap();
        assert_eq!(subject.attributes(), &[(Attribute::Organization, "MadLedger".to_string())]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Subject::parse("C=CN"),
            Err(SubjectError::MissingLeadingSlash("C=CN".to_string()))
        );
        assert_eq!(Subject::parse("/"), Err(SubjectError::Empty));
        assert_eq!(
            Subject::parse("/O=x/CN"),
            Err(SubjectError::MalformedComponent("CN".to_string()))
        );
        assert_eq!(
            Subject::parse("/emailAddress=a@b"),
            Err(SubjectError::UnknownAttribute("emailAddress".to_string()))
        );
    }

    #[test]
    fn test_template_for_identity() {
        let identity = Identity::new(Role::Orderer, "o/0").with_name("orderer0");
        let subject = Subject::for_identity("/O=MadLedger/OU={role}/CN={name}", &identity).unwrap();
        assert_eq!(subject.get(Attribute::OrganizationalUnit), Some("orderer"));
        assert_eq!(subject.get(Attribute::CommonName), Some("orderer0"));
    }
}
