//! Comment threads embedded from Disqus.
//!
//! Every post page carries one thread keyed by its [`PageIdentity`]. The
//! embed script is only fetched once the DOM is ready so the widget never
//! blocks the initial render.

use minijinja::{context, Environment};
use url::Url;

use crate::error::SiteError;

/// Canonical key for a logical page: origin and path, without query or
/// fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageIdentity(String);

impl PageIdentity {
    /// Derive the identity of the page at `url`.
    pub fn from_url(url: &str) -> Result<Self, SiteError> {
        let parsed = Url::parse(url.trim()).map_err(|e| SiteError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let origin = parsed.origin();
        if !origin.is_tuple() {
            return Err(SiteError::InvalidUrl {
                url: url.to_string(),
                reason: "URL has no origin".to_string(),
            });
        }

        Ok(Self(format!(
            "{}{}",
            origin.ascii_serialization(),
            parsed.path()
        )))
    }

    /// The identity as a URL string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PageIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A comment thread bound to a single page.
#[derive(Debug, Clone)]
pub struct CommentThread {
    shortname: String,
    identity: PageIdentity,
}

impl CommentThread {
    /// Create a thread for `identity` on the Disqus forum `shortname`.
    pub fn new(shortname: &str, identity: PageIdentity) -> Result<Self, SiteError> {
        let shortname = shortname.trim();
        let valid = !shortname.is_empty()
            && shortname
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');

        if !valid {
            return Err(SiteError::InvalidArgument(format!(
                "'{}' is not a valid Disqus shortname",
                shortname
            )));
        }

        Ok(Self {
            shortname: shortname.to_string(),
            identity,
        })
    }

    /// Identity of the page this thread belongs to.
    pub fn identity(&self) -> &PageIdentity {
        &self.identity
    }

    /// URL of the loader script for this forum.
    pub fn embed_url(&self) -> String {
        format!("https://{}.disqus.com/embed.js", self.shortname)
    }

    /// Render the thread container and the deferred loader script.
    pub fn embed_snippet(&self) -> Result<String, SiteError> {
        let mut env = Environment::new();
        env.add_template("comments.html", EMBED_TEMPLATE)
            .map_err(|e| SiteError::TemplateError(e.to_string()))?;

        let tmpl = env
            .get_template("comments.html")
            .map_err(|e| SiteError::TemplateError(e.to_string()))?;

        tmpl.render(context! {
            identity => self.identity.as_str(),
            embed_url => self.embed_url(),
        })
        .map_err(|e| SiteError::TemplateError(e.to_string()))
    }
}

const EMBED_TEMPLATE: &str = r#"<div id="disqus_thread"></div>
<script>
  var disqus_config = function () {
    this.page.url = {{ identity|tojson }};
    this.page.identifier = {{ identity|tojson }};
  };
  document.addEventListener('DOMContentLoaded', function () {
    var s = document.createElement('script');
    s.src = {{ embed_url|tojson }};
    s.async = true;
    s.setAttribute('data-timestamp', +new Date());
    (document.head || document.body).appendChild(s);
  });
</script>
<noscript>Please enable JavaScript to view the comments.</noscript>
"#;
