use std::collections::HashSet;

use quire::application::repos::{
    CreatePostParams, CreateTagParams, PostTagsRepo, PostsWriteRepo, RepoError, TagsWriteRepo,
};
use quire::domain::entities::TagRecord;
use quire::infra::memory::MemoryRepositories;
use uuid::Uuid;

async fn seed_tags(repos: &MemoryRepositories, slugs: &[&str]) -> Vec<TagRecord> {
    let mut tags = Vec::new();
    for slug in slugs {
        let tag = repos
            .create_tag(CreateTagParams {
                slug: slug.to_string(),
                title: slug.to_string(),
            })
            .await
            .expect("tag should be created");
        tags.push(tag);
    }
    tags
}

async fn seed_post(repos: &MemoryRepositories, slug: &str, tag_ids: Vec<Uuid>) -> Uuid {
    repos
        .create_post(CreatePostParams {
            slug: slug.to_string(),
            title: slug.to_string(),
            body: String::new(),
            tag_ids,
        })
        .await
        .expect("post should be created")
        .id
}

fn slugs(tags: &[TagRecord]) -> HashSet<String> {
    tags.iter().map(|tag| tag.slug.clone()).collect()
}

#[tokio::test]
async fn replace_then_read_back_yields_the_same_set() {
    let repos = MemoryRepositories::new();
    let tags = seed_tags(&repos, &["rust", "go", "python"]).await;
    let post = seed_post(&repos, "post", vec![tags[0].id]).await;

    repos
        .replace_for_post(post, &[tags[2].id, tags[1].id, tags[2].id])
        .await
        .expect("replace");

    let current = repos.list_by_post(post).await.expect("list");
    assert_eq!(slugs(&current), HashSet::from(["go".to_string(), "python".to_string()]));
    assert_eq!(current.len(), 2, "duplicates collapse");

    repos.replace_for_post(post, &[]).await.expect("clear");
    assert!(repos.list_by_post(post).await.expect("list").is_empty());
}

#[tokio::test]
async fn attach_is_idempotent_and_detach_removes_one_link() {
    let repos = MemoryRepositories::new();
    let tags = seed_tags(&repos, &["rust", "go"]).await;
    let post = seed_post(&repos, "post", Vec::new()).await;

    repos.attach(post, tags[0].id).await.expect("attach");
    repos.attach(post, tags[0].id).await.expect("attach again");
    repos.attach(post, tags[1].id).await.expect("attach second");
    assert_eq!(repos.list_by_post(post).await.expect("list").len(), 2);

    repos.detach(post, tags[0].id).await.expect("detach");
    let current = repos.list_by_post(post).await.expect("list");
    assert_eq!(slugs(&current), HashSet::from(["go".to_string()]));
}

#[tokio::test]
async fn unknown_references_are_rejected() {
    let repos = MemoryRepositories::new();
    let tags = seed_tags(&repos, &["rust"]).await;
    let post = seed_post(&repos, "post", Vec::new()).await;

    let missing_tag = repos.attach(post, Uuid::new_v4()).await;
    assert!(matches!(missing_tag, Err(RepoError::InvalidInput { .. })));

    let missing_post = repos.replace_for_post(Uuid::new_v4(), &[tags[0].id]).await;
    assert!(matches!(missing_post, Err(RepoError::NotFound)));
}

#[tokio::test]
async fn list_by_tag_and_batch_lookup() {
    let repos = MemoryRepositories::new();
    let tags = seed_tags(&repos, &["rust", "go"]).await;
    let first = seed_post(&repos, "first", vec![tags[0].id]).await;
    let second = seed_post(&repos, "second", vec![tags[0].id, tags[1].id]).await;
    let untagged = seed_post(&repos, "untagged", Vec::new()).await;

    let tagged: Vec<String> = repos
        .list_by_tag(tags[0].id)
        .await
        .expect("list by tag")
        .into_iter()
        .map(|post| post.slug)
        .collect();
    assert_eq!(tagged, vec!["second", "first"]);

    let batch = repos
        .list_for_posts(&[first, second, untagged])
        .await
        .expect("batch");
    assert_eq!(batch.get(&first).map(Vec::len), Some(1));
    assert_eq!(batch.get(&second).map(Vec::len), Some(2));
    assert!(!batch.contains_key(&untagged));
}

#[tokio::test]
async fn deleting_either_side_drops_its_links() {
    let repos = MemoryRepositories::new();
    let tags = seed_tags(&repos, &["rust", "go"]).await;
    let post = seed_post(&repos, "post", vec![tags[0].id, tags[1].id]).await;

    repos.delete_tag(tags[0].id).await.expect("delete tag");
    let current = repos.list_by_post(post).await.expect("list");
    assert_eq!(slugs(&current), HashSet::from(["go".to_string()]));

    repos.delete_post(post).await.expect("delete post");
    assert!(repos.list_by_tag(tags[1].id).await.expect("list").is_empty());
}
