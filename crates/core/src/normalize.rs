use crate::models::NOT_SPECIFIED;
use regex::Regex;

#[derive(Debug, Clone)]
pub struct Normalizer {
    bullet_line: Regex,
    whitespace: Regex,
    semicolon: Regex,
    dot_semicolon: Regex,
    leading_semicolon: Regex,
    repeated_dots: Regex,
    semicolon_dot: Regex,
    space_before_punct: Regex,
    missing_space_after_punct: Regex,
    trailing_separator: Regex,
}

impl Normalizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            bullet_line: Regex::new(r"\n[-•·]\s*")?,
            whitespace: Regex::new(r"\s+")?,
            semicolon: Regex::new(r"\s*;\s*")?,
            dot_semicolon: Regex::new(r"\.\s*;\s*")?,
            leading_semicolon: Regex::new(r"^\s*;\s*")?,
            repeated_dots: Regex::new(r"\.{2,}")?,
            semicolon_dot: Regex::new(r";\s*\.")?,
            space_before_punct: Regex::new(r"\s+([,.])")?,
            missing_space_after_punct: Regex::new(r"([,.:])([^\s\d])")?,
            trailing_separator: Regex::new(r"[;,]\s*$")?,
        })
    }

    pub fn clean_description(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return NOT_SPECIFIED.to_string();
        }

        let text = text.replace('*', "").replace("\n\n", "\n");
        let text = self.bullet_line.replace_all(&text, ". ");
        let text = text.replace("\n-", ". ").replace('\n', " ");
        let text = self.whitespace.replace_all(&text, " ");
        let text = self.semicolon.replace_all(&text, "; ");
        let text = self.dot_semicolon.replace_all(&text, ". ");
        let text = self.leading_semicolon.replace_all(&text, "");
        let text = self.repeated_dots.replace_all(&text, ".");
        let text = self.semicolon_dot.replace_all(&text, ".");
        let text = self.space_before_punct.replace_all(&text, "$1");
        let text = self.missing_space_after_punct.replace_all(&text, "$1 $2");
        let text = self.trailing_separator.replace_all(text.trim(), "");
        let text = text.trim();

        if text.is_empty() {
            NOT_SPECIFIED.to_string()
        } else {
            text.to_string()
        }
    }

    pub fn normalize_line(&self, line: &str) -> String {
        let line = self.whitespace.replace_all(line, " ");
        let line = line.replace("..", ".");
        let line = self.semicolon.replace_all(&line, "; ");
        let line = self.dot_semicolon.replace_all(&line, ". ");
        line.trim().to_string()
    }

    pub fn normalize_multiline(&self, text: &str) -> String {
        let lines: Vec<String> = text.split('\n').map(|line| self.normalize_line(line)).collect();
        let start = lines.iter().position(|line| !line.is_empty());
        let end = lines.iter().rposition(|line| !line.is_empty());

        match (start, end) {
            (Some(start), Some(end)) => lines[start..=end].join("\n"),
            _ => String::new(),
        }
    }
}
