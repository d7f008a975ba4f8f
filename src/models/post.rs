use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Open,
    Started,
    Completed,
    Declined,
    Duplicate,
}

impl PostStatus {
    pub fn as_i16(self) -> i16 {
        match self {
            PostStatus::Open => 0,
            PostStatus::Started => 1,
            PostStatus::Completed => 2,
            PostStatus::Declined => 3,
            PostStatus::Duplicate => 4,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(PostStatus::Open),
            1 => Some(PostStatus::Started),
            2 => Some(PostStatus::Completed),
            3 => Some(PostStatus::Declined),
            4 => Some(PostStatus::Duplicate),
            _ => None,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(PostStatus::Open),
            "started" => Some(PostStatus::Started),
            "completed" => Some(PostStatus::Completed),
            "declined" => Some(PostStatus::Declined),
            "duplicate" => Some(PostStatus::Duplicate),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Open => "open",
            PostStatus::Started => "started",
            PostStatus::Completed => "completed",
            PostStatus::Declined => "declined",
            PostStatus::Duplicate => "duplicate",
        }
    }

    /// Closed posts accept no more support.
    pub fn is_closed(self) -> bool {
        matches!(self, PostStatus::Completed | PostStatus::Declined | PostStatus::Duplicate)
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub text: String,
    pub responded_at: DateTime<Utc>,
    pub user_id: i32,
    pub user_name: String,
    pub original_number: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i32,
    pub number: i32,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub author_id: i32,
    pub author_name: String,
    pub total_supporters: i32,
    pub total_comments: i32,
    pub status: PostStatus,
    pub response: Option<PostResponse>,
}

impl Post {
    pub fn path(&self) -> String {
        format!("/posts/{}/{}", self.number, self.slug)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i32,
    #[serde(skip)]
    pub post_id: i32,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author_id: i32,
    pub author_name: String,
}

/// URL-safe form of a title: lowercase ascii alphanumerics joined by single dashes.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
