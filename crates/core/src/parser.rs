use crate::error::IngestError;
use crate::models::{CandidateRecord, NOT_SPECIFIED};
use crate::normalize::Normalizer;
use scraper::{ElementRef, Html};

const SECTION_TITLE_CLASS: &str = "EStaffResumeSectionTitle";
const RESUME_TITLE_CLASS: &str = "EStaffResumeTitle";
const LOCATION_CLASS: &str = "EStaffResumeLocation";
const PERIOD_LENGTH_CLASS: &str = "EStaffResumePeriodLengthDesc";
const JOB_POSITION_CLASS: &str = "EStaffResumePrevJobPositionName";
const JOB_COMMENT_CLASS: &str = "EStaffResumePrevJobPositionComment";
const LANGUAGE_LEVEL_CLASS: &str = "EStaffResumeLanguageLevel";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionLabels {
    pub experience: String,
    pub skills: String,
    pub about: String,
    pub education: String,
    pub additional_education: String,
    pub languages: String,
    pub inline_education: String,
    pub inline_total_experience: String,
}

impl Default for SectionLabels {
    fn default() -> Self {
        Self {
            experience: "Опыт работы".to_string(),
            skills: "Ключевые навыки".to_string(),
            about: "Обо мне".to_string(),
            education: "Образование".to_string(),
            additional_education: "Дополнительное образование".to_string(),
            languages: "Знание языков".to_string(),
            inline_education: "Образование:".to_string(),
            inline_total_experience: "Общий стаж:".to_string(),
        }
    }
}

pub fn is_resume_markup(blob: &str) -> bool {
    blob.contains("<html>") && blob.contains(r#"<p class="EStaffResumeTitle">"#)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneralInfo {
    pub candidate_id: String,
    pub education: String,
    pub desired_position: String,
    pub profession: String,
    pub last_position: String,
    pub total_experience: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResumeText {
    pub general: GeneralInfo,
    pub about: String,
    pub main_education: String,
    pub additional_education: String,
    pub work_experience: String,
    pub key_skills: String,
    pub languages: String,
}

impl ParsedResumeText {
    fn from_fields(record: &CandidateRecord) -> Self {
        Self {
            general: GeneralInfo {
                candidate_id: record.id.to_string(),
                education: NOT_SPECIFIED.to_string(),
                desired_position: NOT_SPECIFIED.to_string(),
                profession: profession_line(record),
                last_position: or_not_specified(record.last_job_position_name.as_deref()),
                total_experience: NOT_SPECIFIED.to_string(),
                location: or_not_specified(record.location_name.as_deref()),
            },
            about: NOT_SPECIFIED.to_string(),
            main_education: NOT_SPECIFIED.to_string(),
            additional_education: NOT_SPECIFIED.to_string(),
            work_experience: NOT_SPECIFIED.to_string(),
            key_skills: NOT_SPECIFIED.to_string(),
            languages: NOT_SPECIFIED.to_string(),
        }
    }

    fn render(&self) -> String {
        let general = &self.general;
        [
            "=== GENERAL INFO ===".to_string(),
            format!("Candidate ID: {}", general.candidate_id),
            format!("Education: {}", general.education),
            format!("Desired position: {}", general.desired_position),
            format!("Profession: {}", general.profession),
            format!("Last position: {}", general.last_position),
            format!("Total experience: {}", general.total_experience),
            format!("Location: {}", general.location),
            "\n=== ABOUT ===".to_string(),
            format!("Summary: {}", self.about),
            "\n=== EDUCATION ===".to_string(),
            format!("Main education: {}", self.main_education),
            format!("Additional education: {}", self.additional_education),
            "\n=== WORK EXPERIENCE ===".to_string(),
            self.work_experience.clone(),
            "\n=== KEY SKILLS ===".to_string(),
            format!("Skills: {}", self.key_skills),
            "\n=== LANGUAGES ===".to_string(),
            format!("Languages: {}", self.languages),
        ]
        .join("\n")
    }
}

/// Malformed or missing markup never fails; it degrades to text built from the flat record fields.
#[derive(Debug, Clone)]
pub struct ResumeParser {
    labels: SectionLabels,
    normalizer: Normalizer,
}

impl ResumeParser {
    pub fn new() -> Result<Self, IngestError> {
        Self::with_labels(SectionLabels::default())
    }

    pub fn with_labels(labels: SectionLabels) -> Result<Self, IngestError> {
        Ok(Self {
            labels,
            normalizer: Normalizer::new()?,
        })
    }

    pub fn parse(&self, record: &CandidateRecord) -> String {
        let sections = match record.html.as_deref().map(str::trim) {
            Some(html) if !html.is_empty() => self.parse_sections(record, html),
            _ => ParsedResumeText::from_fields(record),
        };
        self.normalizer.normalize_multiline(&sections.render())
    }

    pub fn fallback_text(&self, record: &CandidateRecord) -> String {
        self.normalizer
            .normalize_multiline(&ParsedResumeText::from_fields(record).render())
    }

    pub fn parse_sections(&self, record: &CandidateRecord, html: &str) -> ParsedResumeText {
        let document = Html::parse_document(html);
        let markup = Markup::new(&document);

        let mut parsed = ParsedResumeText::from_fields(record);
        let common = self.common_info(&markup);

        parsed.general.education = common.education;
        parsed.general.desired_position = common.desired_position;
        parsed.general.total_experience = common.total_experience;
        parsed.general.location = first_present(&[
            record.location_name.as_deref(),
            common.location.as_deref(),
        ]);
        parsed.about = self.about(&markup);
        parsed.main_education = join_unique(self.main_education(&markup));
        parsed.additional_education = join_unique(self.additional_education(&markup));
        parsed.work_experience = self.work_experience(&markup);
        parsed.key_skills = self.key_skills(&markup);
        parsed.languages = self.languages(&markup);
        parsed
    }

    fn common_info(&self, markup: &Markup<'_>) -> CommonInfo {
        let desired_position = markup
            .first_with_class("p", RESUME_TITLE_CLASS)
            .map(|title| joined_text(title, ""))
            .filter(|text| !text.is_empty());
        let location = markup
            .first_with_class("span", LOCATION_CLASS)
            .map(|span| joined_text(span, ""))
            .filter(|text| !text.is_empty());

        let education_label = self.labels.inline_education.as_str();
        let experience_label = self.labels.inline_total_experience.as_str();
        let mut education = None;
        let mut total_experience = None;

        let summary = markup
            .named("p")
            .map(|paragraph| joined_text(paragraph, " "))
            .find(|text| text.contains(education_label) && text.contains(experience_label));

        if let Some(text) = summary {
            education = text
                .split_once(education_label)
                .and_then(|(_, rest)| rest.split_once(experience_label))
                .map(|(value, _)| value.trim().to_string())
                .filter(|value| !value.is_empty());
            total_experience = text
                .split_once(experience_label)
                .map(|(_, rest)| rest.trim().to_string())
                .filter(|value| !value.is_empty());
        }

        CommonInfo {
            desired_position: desired_position.unwrap_or_else(|| NOT_SPECIFIED.to_string()),
            total_experience: total_experience.unwrap_or_else(|| NOT_SPECIFIED.to_string()),
            education: education.unwrap_or_else(|| NOT_SPECIFIED.to_string()),
            location,
        }
    }

    fn work_experience(&self, markup: &Markup<'_>) -> String {
        let missing = format!("Work experience by employer: {NOT_SPECIFIED}");
        let Some(heading) = markup.section(|title| title.contains(&self.labels.experience)) else {
            return missing;
        };
        let Some(table) = markup.next_named(heading, "table") else {
            return missing;
        };

        let mut items = Vec::new();
        for row in table_rows(table) {
            let cells = child_elements(row, "td");
            if cells.len() < 2 {
                continue;
            }

            let duration = descendant_with_class(cells[0], "p", PERIOD_LENGTH_CLASS)
                .map(|paragraph| joined_text(paragraph, " "))
                .filter(|text| !text.is_empty());
            let position = descendant_with_class(cells[1], "p", JOB_POSITION_CLASS)
                .map(|paragraph| joined_text(paragraph, " "))
                .filter(|text| !text.is_empty());
            let description = descendant_with_class(cells[1], "p", JOB_COMMENT_CLASS)
                .map(|paragraph| {
                    let raw = paragraph.text().collect::<Vec<_>>().join("\n");
                    self.normalizer.clean_description(&raw)
                })
                .unwrap_or_else(|| NOT_SPECIFIED.to_string());

            items.push(format!(
                "{}. Position: {}. Duration: {}. Description: {}",
                items.len() + 1,
                position.as_deref().unwrap_or(NOT_SPECIFIED),
                duration.as_deref().unwrap_or(NOT_SPECIFIED),
                description,
            ));
        }

        if items.is_empty() {
            missing
        } else {
            items.join("\n")
        }
    }

    fn key_skills(&self, markup: &Markup<'_>) -> String {
        let skills: Vec<String> = markup
            .section(|title| title.contains(&self.labels.skills))
            .and_then(|heading| markup.next_named(heading, "p"))
            .map(|paragraph| {
                paragraph
                    .descendants()
                    .filter_map(ElementRef::wrap)
                    .filter(|element| element.value().name() == "span")
                    .map(|span| joined_text(span, " "))
                    .filter(|text| !text.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        if skills.is_empty() {
            NOT_SPECIFIED.to_string()
        } else {
            skills.join(", ")
        }
    }

    fn about(&self, markup: &Markup<'_>) -> String {
        let Some(heading) = markup.section(|title| title.contains(&self.labels.about)) else {
            return NOT_SPECIFIED.to_string();
        };

        let mut texts = Vec::new();
        for element in markup.after(heading) {
            let name = element.value().name();
            if name == "h2" {
                break;
            }
            if name != "p" || is_link_only(element) {
                continue;
            }
            let text = joined_text(element, "\n");
            if !text.is_empty() {
                texts.push(text);
            }
        }

        if texts.is_empty() {
            NOT_SPECIFIED.to_string()
        } else {
            self.normalizer.clean_description(&texts.join("\n"))
        }
    }

    fn main_education(&self, markup: &Markup<'_>) -> Vec<String> {
        let Some(table) = markup
            .section(|title| title.trim().starts_with(&self.labels.education))
            .and_then(|heading| markup.next_named(heading, "table"))
        else {
            return Vec::new();
        };

        let mut items = Vec::new();
        for row in table_rows(table) {
            let cells = child_elements(row, "td");
            if cells.len() < 2 {
                continue;
            }
            let paragraphs = descendants_named(cells[1], "p");
            match paragraphs.len() {
                0 | 1 => {}
                2 => items.push(format!("{} - ", joined_text(paragraphs[1], " "))),
                _ => {
                    let specialty = joined_text(paragraphs[1], " ");
                    let qualification = joined_text(paragraphs[2], " ");
                    if !specialty.is_empty() || !qualification.is_empty() {
                        items.push(format!("{specialty} - {qualification}"));
                    }
                }
            }
        }
        items
    }

    fn additional_education(&self, markup: &Markup<'_>) -> Vec<String> {
        let Some(table) = markup
            .section(|title| title.contains(&self.labels.additional_education))
            .and_then(|heading| markup.next_named(heading, "table"))
        else {
            return Vec::new();
        };

        table_rows(table)
            .into_iter()
            .filter_map(|row| {
                let cells = child_elements(row, "td");
                let paragraphs = descendants_named(*cells.get(1)?, "p");
                let specialty = joined_text(*paragraphs.get(1)?, " ");
                (!specialty.is_empty()).then_some(specialty)
            })
            .collect()
    }

    fn languages(&self, markup: &Markup<'_>) -> String {
        let mut languages = Vec::new();
        let mut cursor = markup
            .section(|title| title.contains(&self.labels.languages))
            .and_then(|heading| markup.next_named(heading, "p"));

        while let Some(paragraph) = cursor {
            if joined_text(paragraph, " ").is_empty() {
                cursor = match next_sibling_element(paragraph) {
                    None => None,
                    Some(next) if next.value().name() == "h2" => None,
                    Some(next) if next.value().name() == "p" => Some(next),
                    Some(_) => next_sibling_named(paragraph, "p"),
                };
                continue;
            }

            let name = paragraph
                .children()
                .filter_map(|node| node.value().as_text())
                .map(|text| &**text)
                .collect::<String>()
                .trim()
                .to_string();
            let level = descendant_with_class(paragraph, "span", LANGUAGE_LEVEL_CLASS)
                .map(|span| joined_text(span, " "))
                .unwrap_or_default();

            if !name.is_empty() {
                if level.is_empty() {
                    languages.push(name);
                } else {
                    languages.push(format!("{name} {level}"));
                }
            }

            cursor = match next_sibling_element(paragraph) {
                None => None,
                Some(next) if next.value().name() == "h2" && has_class(next, SECTION_TITLE_CLASS) => {
                    None
                }
                Some(next) if next.value().name() == "p" => Some(next),
                Some(_) => next_sibling_named(paragraph, "p"),
            };
        }

        if languages.is_empty() {
            NOT_SPECIFIED.to_string()
        } else {
            languages.join(", ")
        }
    }
}

struct CommonInfo {
    desired_position: String,
    total_experience: String,
    education: String,
    location: Option<String>,
}

// Elements in document order, so "the next table after a heading" is a forward scan.
struct Markup<'a> {
    elements: Vec<ElementRef<'a>>,
}

impl<'a> Markup<'a> {
    fn new(document: &'a Html) -> Self {
        Self {
            elements: document
                .root_element()
                .descendants()
                .filter_map(ElementRef::wrap)
                .collect(),
        }
    }

    fn named<'s>(&'s self, name: &'s str) -> impl Iterator<Item = ElementRef<'a>> + 's {
        self.elements
            .iter()
            .copied()
            .filter(move |element| element.value().name() == name)
    }

    fn first_with_class(&self, name: &str, class: &str) -> Option<ElementRef<'a>> {
        self.named(name).find(|element| has_class(*element, class))
    }

    fn section(&self, matches: impl Fn(&str) -> bool) -> Option<usize> {
        self.elements.iter().position(|element| {
            element.value().name() == "h2"
                && has_class(*element, SECTION_TITLE_CLASS)
                && matches(&element.text().collect::<String>())
        })
    }

    fn after(&self, position: usize) -> impl Iterator<Item = ElementRef<'a>> + '_ {
        self.elements.iter().skip(position + 1).copied()
    }

    fn next_named(&self, position: usize, name: &str) -> Option<ElementRef<'a>> {
        self.after(position)
            .find(|element| element.value().name() == name)
    }
}

fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|candidate| candidate == class)
}

fn joined_text(element: ElementRef<'_>, separator: &str) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

fn child_elements<'a>(element: ElementRef<'a>, name: &str) -> Vec<ElementRef<'a>> {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == name)
        .collect()
}

fn descendants_named<'a>(element: ElementRef<'a>, name: &str) -> Vec<ElementRef<'a>> {
    element
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == name)
        .collect()
}

fn descendant_with_class<'a>(
    element: ElementRef<'a>,
    name: &str,
    class: &str,
) -> Option<ElementRef<'a>> {
    descendants_named(element, name)
        .into_iter()
        .find(|child| has_class(*child, class))
}

// The HTML parser wraps rows in an implicit tbody, so direct rows live one level down.
fn table_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let mut rows = Vec::new();
    for child in table.children().filter_map(ElementRef::wrap) {
        match child.value().name() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => rows.extend(child_elements(child, "tr")),
            _ => {}
        }
    }
    rows
}

fn next_sibling_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.next_siblings().find_map(ElementRef::wrap)
}

fn next_sibling_named<'a>(element: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    element
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|sibling| sibling.value().name() == name)
}

fn is_link_only(paragraph: ElementRef<'_>) -> bool {
    let mut children = paragraph.children();
    match (children.next(), children.next()) {
        (Some(only), None) => {
            ElementRef::wrap(only).is_some_and(|element| element.value().name() == "a")
        }
        _ => false,
    }
}

fn join_unique(items: Vec<String>) -> String {
    let mut unique: Vec<String> = Vec::new();
    for item in items {
        let item = item.trim().to_string();
        if !item.is_empty() && !unique.contains(&item) {
            unique.push(item);
        }
    }

    if unique.is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        unique.join("; ")
    }
}

fn profession_line(record: &CandidateRecord) -> String {
    let first = non_blank(record.profession_name_1.as_deref());
    let second = non_blank(record.profession_name_2.as_deref());
    match (first, second) {
        (Some(first), Some(second)) => format!("{first}, {second}"),
        (Some(first), None) => first.to_string(),
        _ => NOT_SPECIFIED.to_string(),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn or_not_specified(value: Option<&str>) -> String {
    non_blank(value).unwrap_or(NOT_SPECIFIED).to_string()
}

fn first_present(values: &[Option<&str>]) -> String {
    values
        .iter()
        .find_map(|value| non_blank(*value))
        .unwrap_or(NOT_SPECIFIED)
        .to_string()
}
