//! Messages describing actions. A `Text` carries a template and its arguments
//! so callers can render or translate it themselves.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Grammatical tense of an action message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tense {
    /// "Create partition /dev/sda1"
    Simple,

    /// "Creating partition /dev/sda1"
    Continuous,
}

/// A parameterized message. Placeholders in the template are `{}` and are
/// filled from `args` in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Text {
    pub tense: Tense,
    pub template: String,
    pub args: Vec<String>,
}

impl Text {
    pub fn new(tense: Tense, template: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            tense,
            template: template.into(),
            args,
        }
    }

    /// Picks the template matching `tense` out of the two given.
    pub fn tensed(
        tense: Tense,
        simple: &'static str,
        continuous: &'static str,
        args: Vec<String>,
    ) -> Self {
        let template = match tense {
            Tense::Simple => simple,
            Tense::Continuous => continuous,
        };
        Self::new(tense, template, args)
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut args = self.args.iter();
        let mut rest = self.template.as_str();
        while let Some(pos) = rest.find("{}") {
            out.push_str(&rest[..pos]);
            match args.next() {
                Some(arg) => out.push_str(arg),
                None => out.push_str("{}"),
            }
            rest = &rest[pos + 2..];
        }
        out.push_str(rest);
        out
    }
}

impl Display for Text {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render() {
        let text = Text::tensed(
            Tense::Simple,
            "Create partition {} ({})",
            "Creating partition {} ({})",
            vec!["/dev/sda1".into(), "500 MiB".into()],
        );
        assert_eq!(text.render(), "Create partition /dev/sda1 (500 MiB)");

        let text = Text::tensed(
            Tense::Continuous,
            "Mount {} at {}",
            "Mounting {} at {}",
            vec!["/dev/sda1".into(), "/data".into()],
        );
        assert_eq!(text.to_string(), "Mounting /dev/sda1 at /data");
    }

    #[test]
    fn test_render_missing_args() {
        let text = Text::new(Tense::Simple, "Delete {} on {}", vec!["sda1".into()]);
        assert_eq!(text.render(), "Delete sda1 on {}");
    }
}
