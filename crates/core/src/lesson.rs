//! Lesson Loading
//!
//! A lesson is a markdown file with YAML frontmatter whose first ```` ```python ````
//! fenced block is the code shown to the learner. The page only needs two
//! facts from it: the lesson identifier and the number of code lines.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum LessonError {
    #[error("Failed to read lesson: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid lesson frontmatter: {0}")]
    Frontmatter(#[from] serde_yaml::Error),
}

#[derive(Debug, Default, Deserialize)]
struct FrontMatter {
    slug: Option<String>,
    title: Option<String>,
    difficulty: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    estimated_minutes: Option<u32>,
}

/// What the walkthrough page reads from its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMetadata {
    pub lesson_id: String,
    pub line_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Lesson {
    pub slug: String,
    pub title: String,
    pub difficulty: String,
    pub tags: Vec<String>,
    pub estimated_minutes: u32,
    /// The first python code block, without its trailing newlines.
    pub code: Option<String>,
    pub line_count: u32,
    /// Markdown body without the frontmatter.
    pub markdown: String,
}

impl Lesson {
    /// Parses a lesson from its markdown source. `slug` is the fallback identifier.
    pub fn parse(slug: &str, source: &str) -> Result<Self, LessonError> {
        let (front, body) = split_frontmatter(source);
        let meta: FrontMatter = match front {
            Some(yaml) if !yaml.trim().is_empty() => serde_yaml::from_str(yaml)?,
            _ => FrontMatter::default(),
        };

        let code = extract_code_block(body);
        let line_count = code
            .as_deref()
            .map(|c| c.split('\n').count() as u32)
            .unwrap_or(0);

        Ok(Self {
            slug: meta.slug.unwrap_or_else(|| slug.to_string()),
            title: meta.title.unwrap_or_else(|| title_from_slug(slug)),
            difficulty: meta.difficulty.unwrap_or_else(|| "medium".to_string()),
            tags: meta.tags,
            estimated_minutes: meta.estimated_minutes.unwrap_or(10),
            code,
            line_count,
            markdown: body.to_string(),
        })
    }

    /// Loads `<dir>/<slug>.md`. Returns `Ok(None)` when there is no such lesson.
    pub fn load(dir: &Path, slug: &str) -> Result<Option<Self>, LessonError> {
        if slug.is_empty() || slug.contains(['/', '\\']) || slug.contains("..") {
            warn!(%slug, "Rejected lesson slug");
            return Ok(None);
        }
        let path = dir.join(format!("{slug}.md"));
        if !path.is_file() {
            return Ok(None);
        }
        let source = std::fs::read_to_string(&path)?;
        Self::parse(slug, &source).map(Some)
    }

    pub fn code_lines(&self) -> impl Iterator<Item = &str> {
        self.code.as_deref().into_iter().flat_map(|c| c.split('\n'))
    }

    pub fn page_metadata(&self) -> PageMetadata {
        PageMetadata {
            lesson_id: self.slug.clone(),
            line_count: self.line_count,
        }
    }
}

/// Loads every `*.md` lesson in `dir`, sorted by file name.
///
/// A missing directory yields no lessons. Lessons that fail to parse are skipped.
pub fn load_all(dir: &Path) -> Result<Vec<Lesson>, LessonError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut names: Vec<String> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(".md"))
        .collect();
    names.sort();

    let mut lessons = Vec::with_capacity(names.len());
    for name in names {
        let slug = &name[..name.len() - 3];
        match Lesson::load(dir, slug) {
            Ok(Some(lesson)) => lessons.push(lesson),
            Ok(None) => {}
            Err(e) => warn!(%slug, error = %e, "Skipping unreadable lesson"),
        }
    }
    Ok(lessons)
}

fn split_frontmatter(source: &str) -> (Option<&str>, &str) {
    let Some(rest) = source.strip_prefix("---\n").or_else(|| source.strip_prefix("---\r\n")) else {
        return (None, source);
    };
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let body = &rest[offset + line.len()..];
            return (Some(&rest[..offset]), body.trim_start_matches(['\r', '\n']));
        }
        offset += line.len();
    }
    (None, source)
}

fn extract_code_block(markdown: &str) -> Option<String> {
    const FENCE: &str = "```python\n";
    let start = markdown.find(FENCE)? + FENCE.len();
    let len = markdown[start..].find("```")?;
    let code = markdown[start..start + len].trim_end_matches('\n');
    if code.is_empty() {
        return None;
    }
    Some(code.to_string())
}

fn title_from_slug(slug: &str) -> String {
    slug.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BINARY_SEARCH: &str = r#"---
title: Binary Search
difficulty: easy
tags: [search, arrays]
estimated_minutes: 8
---

# Binary Search

```python
def binary_search(items, target):
    lo, hi = 0, len(items) - 1
    while lo <= hi:
        mid = (lo + hi) // 2
        if items[mid] == target:
            return mid
        if items[mid] < target:
            lo = mid + 1
        else:
            hi = mid - 1
    return -1
```

## Walkthrough
"#;

    #[test]
    fn test_parse_frontmatter_and_code() {
        let lesson = Lesson::parse("binary-search", BINARY_SEARCH).unwrap();
        assert_eq!(lesson.slug, "binary-search");
        assert_eq!(lesson.title, "Binary Search");
        assert_eq!(lesson.difficulty, "easy");
        assert_eq!(lesson.tags, vec!["search", "arrays"]);
        assert_eq!(lesson.estimated_minutes, 8);
        assert_eq!(lesson.line_count, 11);
        assert_eq!(lesson.code_lines().next(), Some("def binary_search(items, target):"));
        assert!(lesson.markdown.starts_with("# Binary Search"));
        assert_eq!(
            lesson.page_metadata(),
            PageMetadata {
                lesson_id: "binary-search".into(),
                line_count: 11
            }
        );
    }

    #[test]
    fn test_defaults_without_frontmatter_or_code() {
        let lesson = Lesson::parse("depth-first-search", "Just prose.\n").unwrap();
        assert_eq!(lesson.title, "Depth First Search");
        assert_eq!(lesson.difficulty, "medium");
        assert_eq!(lesson.estimated_minutes, 10);
        assert!(lesson.code.is_none());
        assert_eq!(lesson.line_count, 0);
    }

    #[test]
    fn test_load_and_list_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("binary-search.md"), BINARY_SEARCH).unwrap();
        let a_star = "---\ntitle: A*\n---\nNo code yet.\n";
        std::fs::write(dir.path().join("a-star.md"), a_star).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let lessons = load_all(dir.path()).unwrap();
        let slugs: Vec<&str> = lessons.iter().map(|l| l.slug.as_str()).collect();
        assert_eq!(slugs, vec!["a-star", "binary-search"]);

        assert!(Lesson::load(dir.path(), "missing").unwrap().is_none());
        assert!(Lesson::load(dir.path(), "../binary-search").unwrap().is_none());
    }

    #[test]
    fn test_missing_directory_lists_nothing() {
        let lessons = load_all(Path::new("/definitely/not/here")).unwrap();
        assert!(lessons.is_empty());
    }
}
