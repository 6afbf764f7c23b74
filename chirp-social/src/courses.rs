use std::collections::HashSet;

use chirp_core::{CourseCatalog, IntegrationError, ProxyResponse};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::{SocialContext, SocialResult};

lazy_static! {
    static ref FILE_LINK_REGEX: Regex = Regex::new(r"/files/(\d+)").unwrap();
}

/// A file a course links to somewhere in its modules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseFile {
    pub id: u64,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct Module {
    #[serde(default)]
    items: Vec<ModuleItem>,
}

#[derive(Debug, Deserialize)]
struct ModuleItem {
    #[serde(rename = "type")]
    kind: String,
    content_id: Option<u64>,
    page_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Assignment {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Page {
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct File {
    id: u64,
    display_name: String,
    url: String,
}

/// Read access to the configured Canvas instance
pub struct Courses {
    context: SocialContext,
}

/// Returns every distinct file id linked from an HTML body, in order of appearance
pub fn extract_file_ids(html: &str) -> Vec<u64> {
    let mut seen = HashSet::new();

    FILE_LINK_REGEX
        .captures_iter(html)
        .filter_map(|c| c[1].parse().ok())
        .filter(|id| seen.insert(*id))
        .collect()
}

impl Courses {
    pub fn new(context: &SocialContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    fn catalog(&self) -> SocialResult<&dyn CourseCatalog> {
        self.context
            .integrations
            .courses
            .as_deref()
            .ok_or(IntegrationError::NotConfigured("Canvas").into())
    }

    /// Forwards a GET to Canvas as-is
    pub async fn proxy(&self, path: &str, query: Option<&str>) -> SocialResult<ProxyResponse> {
        let path = path.trim_start_matches('/');
        Ok(self.catalog()?.get(path, query).await?)
    }

    /// Every file a course links to from its modules, each listed once
    pub async fn materials(&self, course_id: u64) -> SocialResult<Vec<CourseFile>> {
        let catalog = self.catalog()?;

        let modules: Vec<Module> = catalog
            .get(
                &format!("courses/{}/modules", course_id),
                Some("include[]=items&per_page=100"),
            )
            .await?
            .json()?;

        let mut file_ids = vec![];

        for item in modules.into_iter().flat_map(|m| m.items) {
            match (item.kind.as_str(), item.content_id, item.page_url) {
                ("File", Some(id), _) => file_ids.push(id),
                ("Assignment", Some(id), _) => {
                    let path = format!("courses/{}/assignments/{}", course_id, id);

                    if let Some(assignment) = fetch_html::<Assignment>(catalog, &path).await {
                        let html = assignment.description.unwrap_or_default();
                        file_ids.extend(extract_file_ids(&html));
                    }
                }
                ("Page", _, Some(page_url)) => {
                    let path = format!("courses/{}/pages/{}", course_id, page_url);

                    if let Some(page) = fetch_html::<Page>(catalog, &path).await {
                        file_ids.extend(extract_file_ids(&page.body.unwrap_or_default()));
                    }
                }
                _ => {}
            }
        }

        let mut seen = HashSet::new();
        let mut files = vec![];

        for id in file_ids.into_iter().filter(|id| seen.insert(*id)) {
            match catalog.get(&format!("files/{}", id), None).await.and_then(|r| r.json::<File>()) {
                Ok(file) => files.push(CourseFile {
                    id: file.id,
                    name: file.display_name,
                    url: file.url,
                }),
                Err(e) => log::warn!("Skipping file {} of course {}: {}", id, course_id, e),
            }
        }

        Ok(files)
    }
}

/// Fetches an item with an HTML body, skipping it when it can't be read
async fn fetch_html<T>(catalog: &dyn CourseCatalog, path: &str) -> Option<T>
where
    T: serde::de::DeserializeOwned,
{
    match catalog.get(path, None).await.and_then(|r| r.json::<T>()) {
        Ok(item) => Some(item),
        Err(e) => {
            log::warn!("Skipping {}: {}", path, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chirp_core::Config;
    use serde_json::json;

    use super::*;
    use crate::{
        testing::{FakeCatalog, TestSocial},
        Integrations, SocialError,
    };

    async fn with_catalog(catalog: FakeCatalog) -> (TestSocial, Arc<FakeCatalog>) {
        let catalog = Arc::new(catalog);
        let integrations = Integrations {
            courses: Some(catalog.clone()),
            ..Default::default()
        };

        let test = TestSocial::build(Config::default(), integrations, &[]).await;
        (test, catalog)
    }

    fn file(id: u64, name: &str) -> serde_json::Value {
        json!({
            "id": id,
            "display_name": name,
            "url": format!("https://canvas.test/files/{}/download", id),
        })
    }

    #[test]
    fn test_extract_file_ids() {
        let html = r#"<a href="/courses/1/files/42/download">a</a>
            <img src="https://canvas.test/files/7/preview"> <a href="/files/42">again</a>"#;

        assert_eq!(extract_file_ids(html), vec![42, 7]);
        assert!(extract_file_ids("<p>no links</p>").is_empty());
    }

    #[tokio::test]
    async fn test_materials() {
        let catalog = FakeCatalog::default()
            .route(
                "courses/5/modules",
                json!([
                    { "items": [
                        { "type": "File", "content_id": 1 },
                        { "type": "Assignment", "content_id": 20 },
                    ]},
                    { "items": [
                        { "type": "Page", "page_url": "week-1" },
                        { "type": "ExternalUrl" },
                        { "type": "Page", "page_url": "missing" },
                    ]},
                ]),
            )
            .route(
                "courses/5/assignments/20",
                json!({ "description": "<a href=\"/files/2\">x</a> <a href=\"/files/1\">y</a>" }),
            )
            .route(
                "courses/5/pages/week-1",
                json!({ "body": "<a href=\"/files/3\">z</a>" }),
            )
            .route("files/1", file(1, "syllabus.pdf"))
            .route("files/2", file(2, "homework.pdf"));

        let (test, catalog) = with_catalog(catalog).await;
        let files = test.social.courses.materials(5).await.unwrap();

        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["syllabus.pdf", "homework.pdf"]);

        let requests = catalog.requests.lock();
        assert_eq!(requests.iter().filter(|r| *r == "files/1").count(), 1);
        assert!(requests.contains(&"files/3".to_string()));
    }

    #[tokio::test]
    async fn test_missing_course_mirrors_status() {
        let (test, _) = with_catalog(FakeCatalog::default()).await;

        let error = test.social.courses.materials(9).await.unwrap_err();
        assert!(matches!(
            error,
            SocialError::Integration(IntegrationError::Status { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_proxy() {
        let (test, catalog) =
            with_catalog(FakeCatalog::default().route("courses", json!([{ "id": 1 }]))).await;

        let response = test.social.courses.proxy("/courses", None).await.unwrap();
        assert!(response.is_success());
        assert_eq!(catalog.requests.lock()[0], "courses");

        let unconfigured = TestSocial::with_users(&[]).await;
        assert!(matches!(
            unconfigured.social.courses.proxy("courses", None).await,
            Err(SocialError::Integration(IntegrationError::NotConfigured(_)))
        ));
    }
}
