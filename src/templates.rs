//! Per-category notification templates.
//!
//! A template is a subject and a body, each parsed once into literal text and
//! named placeholders. `{{` and `}}` produce literal braces.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::TemplateError;
use crate::models::{Category, ClassifiedStudent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Name,
    Email,
    Course,
    Quiz2Percentage,
    Quiz3Percentage,
    Improvement,
}

impl FromStr for Placeholder {
    type Err = TemplateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "name" => Ok(Placeholder::Name),
            "email" => Ok(Placeholder::Email),
            "course" => Ok(Placeholder::Course),
            "quiz2_percentage" => Ok(Placeholder::Quiz2Percentage),
            "quiz3_percentage" => Ok(Placeholder::Quiz3Percentage),
            "improvement" => Ok(Placeholder::Improvement),
            other => Err(TemplateError::UnknownPlaceholder(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Field(Placeholder),
}

#[derive(Debug, Clone, PartialEq)]
struct Text {
    segments: Vec<Segment>,
}

impl Text {
    fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.char_indices().peekable();

        while let Some((at, ch)) = chars.next() {
            match ch {
                '{' if matches!(chars.peek(), Some((_, '{'))) => {
                    chars.next();
                    literal.push('{');
                }
                '}' if matches!(chars.peek(), Some((_, '}'))) => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some((_, '}')) => break,
                            Some((_, '{')) | None => return Err(TemplateError::UnbalancedBrace(at)),
                            Some((_, c)) => name.push(c),
                        }
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(name.trim().parse()?));
                }
                '}' => return Err(TemplateError::UnbalancedBrace(at)),
                c => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    fn render(&self, student: &ClassifiedStudent, course: &str) -> String {
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Field(Placeholder::Name) => output.push_str(&student.name),
                Segment::Field(Placeholder::Email) => output.push_str(&student.email),
                Segment::Field(Placeholder::Course) => output.push_str(course),
                Segment::Field(Placeholder::Quiz2Percentage) => {
                    let _ = write!(output, "{:.1}", student.quiz2_percentage);
                }
                Segment::Field(Placeholder::Quiz3Percentage) => {
                    let _ = write!(output, "{:.1}", student.quiz3_percentage);
                }
                Segment::Field(Placeholder::Improvement) => {
                    let _ = write!(output, "{:+.1}", student.improvement);
                }
            }
        }
        output
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    subject: Text,
    body: Text,
}

impl Template {
    pub fn parse(subject: &str, body: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            subject: Text::parse(subject)?,
            body: Text::parse(body)?,
        })
    }
}

/// A message ready to hand to a mailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct TemplateSource {
    subject: String,
    body: String,
}

/// One template per category.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    templates: HashMap<Category, Template>,
}

impl TemplateSet {
    pub fn builtin() -> Result<Self, TemplateError> {
        let templates = BUILTIN
            .iter()
            .map(|(category, subject, body)| Ok((*category, Template::parse(subject, body)?)))
            .collect::<Result<_, TemplateError>>()?;
        Ok(Self { templates })
    }

    /// Built-in templates, with any category named in the TOML document
    /// replaced:
    ///
    /// ```toml
    /// [struggling]
    /// subject = "Checking in about {course}"
    /// body = "Hi {name}, ..."
    /// ```
    pub fn with_overrides(toml_source: &str) -> Result<Self, TemplateError> {
        let mut set = Self::builtin()?;
        let overrides: BTreeMap<String, TemplateSource> = toml::from_str(toml_source)?;
        for (key, source) in overrides {
            let category: Category = key
                .parse()
                .map_err(|_| TemplateError::UnknownCategory(key.clone()))?;
            set.templates
                .insert(category, Template::parse(&source.subject, &source.body)?);
        }
        Ok(set)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, TemplateError> {
        let source = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_overrides(&source)
    }

    pub fn render(&self, student: &ClassifiedStudent, course: &str) -> RenderedMessage {
        match self.templates.get(&student.category) {
            Some(template) => RenderedMessage {
                subject: template.subject.render(student, course),
                body: template.body.render(student, course),
            },
            // Every category is filled by `builtin`, overrides only replace.
            None => RenderedMessage {
                subject: course.to_string(),
                body: String::new(),
            },
        }
    }
}

const BUILTIN: [(Category, &str, &str); 5] = [
    (
        Category::Excelling,
        "Excellent Work in {course}!",
        concat!(
            "Hi {name},\n\n",
            "I hope this email finds you well! I wanted to take a moment to recognize your ",
            "outstanding performance in {course}.\n\n",
            "Your consistent high scores on both Quiz 2 ({quiz2_percentage}%) and Quiz 3 ",
            "({quiz3_percentage}%) demonstrate your strong understanding of the course material. ",
            "Your dedication and hard work are truly commendable!\n\n",
            "Keep up the excellent work, and don't hesitate to reach out if you have any ",
            "questions or if you'd like to explore any topics in more depth.\n\n",
            "Best regards,\nYour {course} Instructor\n",
        ),
    ),
    (
        Category::Improving,
        "Great Improvement in {course}!",
        concat!(
            "Hi {name},\n\n",
            "I wanted to reach out and congratulate you on your significant improvement in ",
            "{course}!\n\n",
            "I noticed that while you scored {quiz2_percentage}% on Quiz 2, you've made an ",
            "impressive jump to {quiz3_percentage}% on Quiz 3 - that's a {improvement} ",
            "percentage point improvement! This shows real dedication and growth.\n\n",
            "Your hard work is paying off, and I'm excited to see this positive trajectory ",
            "continue. Keep up the great work!\n\n",
            "If you have any questions or need additional support, please don't hesitate to ",
            "reach out.\n\n",
            "Best regards,\nYour {course} Instructor\n",
        ),
    ),
    (
        Category::Struggling,
        "Let's Work Together to Succeed in {course}",
        concat!(
            "Hi {name},\n\n",
            "I hope you're doing well. I wanted to reach out because I noticed you might be ",
            "having some challenges with the course material.\n\n",
            "Your current scores (Quiz 2: {quiz2_percentage}%, Quiz 3: {quiz3_percentage}%) ",
            "suggest there might be some concepts that need additional attention. Remember, ",
            "it's completely normal to face challenges, and the important thing is how we ",
            "address them.\n\n",
            "I'd like to offer some support:\n",
            "- Office hours are available for one-on-one help\n",
            "- Study groups can be incredibly beneficial\n",
            "- I'm here to answer any questions you might have\n\n",
            "Let's work together to get you back on track. What specific topics would you ",
            "like to focus on?\n\n",
            "Best regards,\nYour {course} Instructor\n",
        ),
    ),
    (
        Category::Declining,
        "Let's Get Back on Track in {course}",
        concat!(
            "Hi {name},\n\n",
            "I hope you're doing well. I wanted to reach out because I noticed a concerning ",
            "trend in your recent quiz performance.\n\n",
            "While you did well on Quiz 2 ({quiz2_percentage}%), your Quiz 3 score ",
            "({quiz3_percentage}%) suggests there might be some challenges with the newer ",
            "material.\n\n",
            "I'd encourage you to:\n",
            "- Review the Quiz 3 material more thoroughly\n",
            "- Attend office hours for clarification\n",
            "- Consider forming a study group\n",
            "- Reach out to me with any specific questions\n\n",
            "Let's work together to get you back on the right track. What can I do to ",
            "support you?\n\n",
            "Best regards,\nYour {course} Instructor\n",
        ),
    ),
    (
        Category::Consistent,
        "Steady Progress in {course}!",
        concat!(
            "Hi {name},\n\n",
            "I hope this email finds you well! I wanted to take a moment to acknowledge your ",
            "consistent performance in {course}.\n\n",
            "Your scores show steady progress (Quiz 2: {quiz2_percentage}%, Quiz 3: ",
            "{quiz3_percentage}%), which indicates a solid understanding of the course ",
            "material.\n\n",
            "Keep up the good work, and remember that I'm here if you have any questions or ",
            "want to explore any topics further.\n\n",
            "Best regards,\nYour {course} Instructor\n",
        ),
    ),
];
