// handlers/public/sitemap.rs - GET /sitemap.xml

use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};

use crate::context::RequestContext;
use crate::error::ApiError;

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn render(base_url: &str, paths: &[String]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push_str(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#);
    xml.push_str(&format!("<url><loc>{}</loc></url>", escape(base_url)));
    for path in paths {
        xml.push_str(&format!("<url><loc>{}</loc></url>", escape(&format!("{}{}", base_url, path))));
    }
    xml.push_str("</urlset>");
    xml
}

pub async fn sitemap(ctx: RequestContext) -> Result<Response, ApiError> {
    if ctx.tenant()?.is_private {
        return Err(ApiError::not_found("Sitemap not found"));
    }

    let posts = ctx.services().posts.get_all().await?;
    let paths: Vec<String> = posts.iter().map(|post| post.path()).collect();
    let xml = render(&ctx.base_url(), &paths);
    Ok(([(CONTENT_TYPE, "application/xml")], xml).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_base_and_posts() {
        let xml = render(
            "http://demo.test.fider.io:3000",
            &["/posts/1/my-great-idea".to_string(), "/posts/2/a-b".to_string()],
        );
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains("<url><loc>http://demo.test.fider.io:3000</loc></url>"));
        assert!(xml.contains("<url><loc>http://demo.test.fider.io:3000/posts/1/my-great-idea</loc></url>"));
        assert!(xml.ends_with("</urlset>"));
    }

    #[test]
    fn escapes_locations() {
        assert_eq!(escape("http://a.io/?x=1&y=<2>"), "http://a.io/?x=1&amp;y=&lt;2&gt;");
    }
}
