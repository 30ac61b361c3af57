//! Local directory publisher: `<slug>.md` with front matter plus `<slug>.json`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use blogsmith_shared::{BlogsmithError, Document, PublishReceipt, Publisher, Result};
use serde_json::Value;
use tracing::{debug, instrument};

/// Writes finished posts under a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
    root: PathBuf,
}

impl DirectoryPublisher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Publisher for DirectoryPublisher {
    #[instrument(skip_all, fields(slug = %document.slug, root = %self.root.display()))]
    async fn publish(&self, document: &Document) -> Result<PublishReceipt> {
        let slug = safe_slug(&document.slug);
        if slug.is_empty() {
            return Err(BlogsmithError::Publish(
                "document has no usable slug".into(),
            ));
        }

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| BlogsmithError::io(&self.root, e))?;

        let md_path = self.root.join(format!("{slug}.md"));
        let json_path = self.root.join(format!("{slug}.json"));

        let markdown = format!("{}\n{}", build_frontmatter(document), document.body);
        write_atomic(&md_path, markdown.as_bytes()).await?;

        let json = serde_json::to_vec_pretty(document)
            .map_err(|e| BlogsmithError::Publish(format!("JSON serialization failed: {e}")))?;
        write_atomic(&json_path, &json).await?;

        debug!(path = %md_path.display(), "wrote post");
        Ok(PublishReceipt {
            id: slug,
            url: format!("file://{}", md_path.display()),
        })
    }
}

/// Write to a temp file next to `path`, then rename over it.
async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    tokio::fs::write(&temp, content)
        .await
        .map_err(|e| BlogsmithError::io(&temp, e))?;
    tokio::fs::rename(&temp, path)
        .await
        .map_err(|e| BlogsmithError::io(path, e))
}

/// Restrict the slug to characters that are safe in a file name.
fn safe_slug(slug: &str) -> String {
    slug.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

/// Build a YAML front matter block from the document and its metadata.
fn build_frontmatter(document: &Document) -> String {
    let meta = &document.metadata;
    let mut fm = String::from("---\n");
    fm.push_str(&format!("title: \"{}\"\n", escape_yaml_string(&document.title)));
    fm.push_str(&format!("slug: \"{}\"\n", document.slug));
    if let Some(desc) = meta.get("metaDescription").and_then(Value::as_str) {
        fm.push_str(&format!("description: \"{}\"\n", escape_yaml_string(desc)));
    }
    for key in ["keywords", "categories", "tags"] {
        let items = string_list(meta.get(key));
        if !items.is_empty() {
            let quoted: Vec<String> = items
                .iter()
                .map(|s| format!("\"{}\"", escape_yaml_string(s)))
                .collect();
            fm.push_str(&format!("{key}: [{}]\n", quoted.join(", ")));
        }
    }
    if let Some(minutes) = meta.get("estimatedReadingTime").and_then(Value::as_u64) {
        fm.push_str(&format!("reading_time: {minutes}\n"));
    }
    fm.push_str(&format!("published_at: \"{}\"\n", chrono::Utc::now().to_rfc3339()));
    fm.push_str("---\n");
    fm
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Escape special characters in a YAML string value.
fn escape_yaml_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("bs-publish-test-{}", uuid::Uuid::now_v7()))
    }

    fn document() -> Document {
        Document {
            title: "Brewing \"Perfect\" Green Tea".into(),
            slug: "brewing-green-tea".into(),
            body: "# Brewing Green Tea\n\nUse water below boiling.\n".into(),
            metadata: json!({
                "metaDescription": "How to brew green tea.",
                "keywords": ["green tea", "brewing"],
                "tags": ["tea"],
                "estimatedReadingTime": 3
            }),
        }
    }

    #[tokio::test]
    async fn writes_markdown_and_json() {
        let tmp = temp_dir();
        let publisher = DirectoryPublisher::new(&tmp);

        let receipt = publisher.publish(&document()).await.unwrap();
        assert_eq!(receipt.id, "brewing-green-tea");
        assert!(receipt.url.starts_with("file://"));

        let md = std::fs::read_to_string(tmp.join("brewing-green-tea.md")).unwrap();
        assert!(md.starts_with("---\n"));
        assert!(md.contains("title: \"Brewing \\\"Perfect\\\" Green Tea\""));
        assert!(md.contains("keywords: [\"green tea\", \"brewing\"]"));
        assert!(md.contains("reading_time: 3"));
        assert!(md.contains("# Brewing Green Tea"));
        assert!(!md.contains("categories:"));

        let json: Document =
            serde_json::from_slice(&std::fs::read(tmp.join("brewing-green-tea.json")).unwrap())
                .unwrap();
        assert_eq!(json, document());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[tokio::test]
    async fn rejects_empty_slug() {
        let tmp = temp_dir();
        let publisher = DirectoryPublisher::new(&tmp);
        let mut doc = document();
        doc.slug = "../..".into();

        let err = publisher.publish(&doc).await.unwrap_err();
        assert!(matches!(err, BlogsmithError::Publish(_)));
    }
}
