use crate::error::{Error, Result};

const EXPECTED_SHAPE: &str = "expected https://<host>/file/d/<id>/view";

/// A file-hosting sharing link of the shape `https://<host>/file/d/<id>/...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharingLink {
    id: String,
}

impl SharingLink {
    pub fn parse(link: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidLink {
            link: link.to_string(),
            reason,
        };

        let segments: Vec<&str> = link.trim().split('/').collect();
        if segments.len() < 6 {
            return Err(invalid(format!(
                "only {} '/'-separated segments, {}",
                segments.len(),
                EXPECTED_SHAPE
            )));
        }

        if !matches!(segments[0], "https:" | "http:") || !segments[1].is_empty() {
            return Err(invalid(format!("not an http(s) URL, {}", EXPECTED_SHAPE)));
        }
        if segments[2].is_empty() {
            return Err(invalid("missing host".to_string()));
        }
        if segments[3] != "file" || segments[4] != "d" {
            return Err(invalid(format!(
                "path does not start with /file/d/, {}",
                EXPECTED_SHAPE
            )));
        }

        let id = segments[5]
            .split(['?', '#'])
            .next()
            .unwrap_or_default();

        if id.is_empty() {
            return Err(invalid("empty file id".to_string()));
        }
        if let Some(c) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(invalid(format!("unexpected character '{}' in file id", c)));
        }

        Ok(Self { id: id.to_string() })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn download_url(&self, base: &str) -> String {
        format!("{}{}", base, self.id)
    }
}

/// Turns a sharing link into a direct-download URL under `base`.
pub fn resolve_download_url(link: &str, base: &str) -> Result<String> {
    let link = SharingLink::parse(link)?;
    tracing::debug!("Resolved file id {}", link.id());
    Ok(link.download_url(base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_DOWNLOAD_BASE;

    #[test]
    fn test_resolves_sharing_link() {
        let url = resolve_download_url(
            "https://drive.google.com/file/d/10G-d7rdIHsQ9s8XE1mgs6t-hfQjVD-KA/view?usp=sharing",
            DEFAULT_DOWNLOAD_BASE,
        )
        .unwrap();
        assert_eq!(
            url,
            "https://drive.google.com/uc?id=10G-d7rdIHsQ9s8XE1mgs6t-hfQjVD-KA"
        );
    }

    #[test]
    fn test_resolves_any_host_and_base() {
        let url = resolve_download_url("https://host/file/d/ID42/view?usp=sharing", "base:").unwrap();
        assert_eq!(url, "base:ID42");
    }

    #[test]
    fn test_strips_query_from_id_segment() {
        let link = SharingLink::parse("https://host/file/d/abc_DEF-1?usp=sharing").unwrap();
        assert_eq!(link.id(), "abc_DEF-1");
    }

    #[test]
    fn test_short_link_is_descriptive_error() {
        let err = resolve_download_url("https://host/abc", DEFAULT_DOWNLOAD_BASE).unwrap_err();
        match &err {
            Error::InvalidLink { link, reason } => {
                assert_eq!(link, "https://host/abc");
                assert!(reason.contains("4 '/'-separated segments"), "{reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("/file/d/"));
    }

    #[test]
    fn test_rejects_wrong_shapes() {
        for link in [
            "ftp://host/file/d/abc/view",
            "https://host/folders/d/abc/view",
            "https:///file/d/abc/view",
            "https://host/file/d//view",
            "https://host/file/d/a%20b/view",
            "<link to pretrained model>",
        ] {
            assert!(
                matches!(SharingLink::parse(link), Err(Error::InvalidLink { .. })),
                "expected rejection for {link}"
            );
        }
    }
}
