//! Background tasks enqueued by handlers.

use crate::actions::tenant::{Invitation, INVITE_PLACEHOLDER};
use crate::email::Recipient;
use crate::models::{Post, PostStatus, User};
use crate::worker::{JobContext, Task};

const PLATFORM_NAME: &str = "ideaboard";

fn link(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url, path)
}

pub fn send_signup_email(name: String, email: String, key: String) -> Task {
    Task::new("Send sign up email", move |ctx: JobContext| async move {
        let to = Recipient::new(name, email).with_param("link", link(&ctx.base_url, &format!("/signup/verify?k={}", key)));
        ctx.services.emailer.send("signup_email", PLATFORM_NAME, to).await?;
        Ok(())
    })
}

pub fn send_signin_email(email: String, key: String) -> Task {
    Task::new("Send sign in email", move |ctx: JobContext| async move {
        let tenant = ctx.tenant()?;
        let to = Recipient::new("", email)
            .with_param("tenantName", tenant.name.clone())
            .with_param("link", link(&ctx.base_url, &format!("/signin/verify?k={}", key)));
        ctx.services.emailer.send("signin_email", &tenant.name, to).await?;
        Ok(())
    })
}

pub fn send_change_email_confirmation(email: String, key: String) -> Task {
    Task::new("Send change email confirmation", move |ctx: JobContext| async move {
        let tenant = ctx.tenant()?;
        let user = ctx.user()?;
        let previous = if user.email.is_empty() { "(empty)" } else { user.email.as_str() };
        let to = Recipient::new(user.name.clone(), email.clone())
            .with_param("name", user.name.clone())
            .with_param("oldEmail", previous)
            .with_param("newEmail", email)
            .with_param("link", link(&ctx.base_url, &format!("/change-email/verify?k={}", key)));
        ctx.services.emailer.send("change_emailaddress_email", &tenant.name, to).await?;
        Ok(())
    })
}

pub fn send_invites(subject: String, message: String, invitations: Vec<Invitation>) -> Task {
    Task::new("Send invites", move |ctx: JobContext| async move {
        let tenant = ctx.tenant()?;
        let to = invitations
            .into_iter()
            .map(|invitation| {
                let url = link(&ctx.base_url, &format!("/invite/verify?k={}", invitation.verification_key));
                Recipient::new("", invitation.email)
                    .with_param("subject", subject.clone())
                    .with_param("message", message.replace(INVITE_PLACEHOLDER, &url))
            })
            .collect();
        ctx.services.emailer.batch_send("invite_email", &tenant.name, to).await?;
        Ok(())
    })
}

/// Creates an in-app notification for every recipient except the acting
/// user and returns the email recipients for the same audience.
async fn notify(ctx: &JobContext, recipients: Vec<User>, title: &str, post: &Post) -> anyhow::Result<Vec<Recipient>> {
    let actor = ctx.user()?;
    let link = link(&ctx.base_url, &post.path());
    let mut emails = Vec::new();
    for user in recipients {
        if user.id == actor.id {
            continue;
        }
        ctx.services.notifications.insert(&user, title, &link, post.id).await?;
        emails.push(
            Recipient::new(user.name.clone(), user.email.clone())
                .with_param("title", post.title.clone())
                .with_param("view", link.clone()),
        );
    }
    Ok(emails)
}

pub fn notify_about_new_post(post: Post) -> Task {
    Task::new("Notify about new post", move |ctx: JobContext| async move {
        let staff: Vec<User> = ctx
            .services
            .users
            .get_all()
            .await?
            .into_iter()
            .filter(User::is_collaborator)
            .collect();

        let title = format!("New post: **{}**", post.title);
        let to = notify(&ctx, staff, &title, &post).await?;
        let actor = ctx.user()?;
        ctx.services.emailer.batch_send("new_post", &actor.name, to).await?;
        Ok(())
    })
}

pub fn notify_about_new_comment(post: Post, content: String) -> Task {
    Task::new("Notify about new comment", move |ctx: JobContext| async move {
        let actor = ctx.user()?.name.clone();
        let subscribers = ctx.services.posts.get_subscribers(post.id).await?;

        let title = format!("**{}** left a comment on **{}**", actor, post.title);
        let to = notify(&ctx, subscribers, &title, &post)
            .await?
            .into_iter()
            .map(|recipient| recipient.with_param("content", content.clone()))
            .collect();
        ctx.services.emailer.batch_send("new_comment", &actor, to).await?;
        Ok(())
    })
}

pub fn notify_about_status_change(post: Post, status: PostStatus) -> Task {
    Task::new("Notify about status change", move |ctx: JobContext| async move {
        let actor = ctx.user()?.name.clone();
        let subscribers = ctx.services.posts.get_subscribers(post.id).await?;

        let title = format!("**{}** changed status of **{}** to **{}**", actor, post.title, status);
        let to = notify(&ctx, subscribers, &title, &post)
            .await?
            .into_iter()
            .map(|recipient| recipient.with_param("status", status.as_str()))
            .collect();
        ctx.services.emailer.batch_send("change_status", &actor, to).await?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, Harness};
    use crate::worker::{execute, Message};

    fn message(task: Task, user: User) -> Message {
        Message {
            task,
            tenant: Some(fixtures::demo()),
            user: Some(user),
            base_url: "http://demo.test.fider.io".to_string(),
        }
    }

    #[tokio::test]
    async fn signin_email_links_to_verification() {
        let harness = Harness::new();
        let task = send_signin_email("jon.snow@got.com".to_string(), "KEY123".to_string());
        let msg = Message {
            task,
            tenant: Some(fixtures::demo()),
            user: None,
            base_url: "http://demo.test.fider.io".to_string(),
        };
        execute(0, msg, &harness.job_environment()).await.unwrap();

        let sent = harness.emailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].template, "signin_email");
        assert_eq!(sent[0].to[0].address, "jon.snow@got.com");
        assert_eq!(sent[0].to[0].params["link"], "http://demo.test.fider.io/signin/verify?k=KEY123");
    }

    #[tokio::test]
    async fn invites_replace_placeholder() {
        let harness = Harness::new();
        let invitations = vec![Invitation {
            email: "bran@got.com".to_string(),
            verification_key: "INV1".to_string(),
        }];
        let task = send_invites("Join us".to_string(), "Click %invite% now".to_string(), invitations);
        execute(0, message(task, fixtures::jon_snow()), &harness.job_environment()).await.unwrap();

        let sent = harness.emailer.sent();
        assert_eq!(
            sent[0].to[0].params["message"],
            "Click http://demo.test.fider.io/invite/verify?k=INV1 now"
        );
    }

    #[tokio::test]
    async fn comment_notifies_subscribers_but_not_the_author() {
        let harness = Harness::new();
        let (trx, services) = harness.begin(Some(fixtures::demo()), Some(fixtures::jon_snow())).await;
        let post = services.posts.add("Add dark mode support", "").await.unwrap();
        trx.commit().await.unwrap();

        let (trx, services) = harness.begin(Some(fixtures::demo()), Some(fixtures::arya_stark())).await;
        services.posts.add_comment(post.id, "+1 from me").await.unwrap();
        trx.commit().await.unwrap();

        let task = notify_about_new_comment(post.clone(), "+1 from me".to_string());
        execute(0, message(task, fixtures::arya_stark()), &harness.job_environment()).await.unwrap();

        let notifications = harness.db.notifications_of(fixtures::jon_snow().id);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, "**Arya Stark** left a comment on **Add dark mode support**");
        assert_eq!(notifications[0].link, "http://demo.test.fider.io/posts/1/add-dark-mode-support");
        assert!(harness.db.notifications_of(fixtures::arya_stark().id).is_empty());

        let sent = harness.emailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to.len(), 1);
        assert_eq!(sent[0].to[0].address, "jon.snow@got.com");
    }

    #[tokio::test]
    async fn new_post_notifies_staff() {
        let harness = Harness::new();
        let (trx, services) = harness.begin(Some(fixtures::demo()), Some(fixtures::arya_stark())).await;
        let post = services.posts.add("Export posts to CSV", "").await.unwrap();
        trx.commit().await.unwrap();

        let task = notify_about_new_post(post);
        execute(0, message(task, fixtures::arya_stark()), &harness.job_environment()).await.unwrap();

        let notifications = harness.db.notifications_of(fixtures::jon_snow().id);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, "New post: **Export posts to CSV**");
    }
}
