// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::integration::helpers::{insert_site, setup_db};
use auditrs::domain::models::contact::{Contact, ContactCandidate};
use auditrs::domain::models::site::Site;
use auditrs::domain::repositories::contact_repository::ContactRepository;
use auditrs::domain::repositories::site_repository::SiteRepository;
use auditrs::infrastructure::repositories::contact_repo_impl::ContactRepositoryImpl;
use auditrs::infrastructure::repositories::site_repo_impl::SiteRepositoryImpl;

fn candidate(email: &str, confidence: i32) -> ContactCandidate {
    ContactCandidate {
        email: email.to_string(),
        first_name: Some("Ada".to_string()),
        last_name: None,
        position: Some("CTO".to_string()),
        confidence,
    }
}

#[tokio::test]
async fn test_upsert_keeps_id_for_known_domain() {
    let db = setup_db().await;
    let sites = SiteRepositoryImpl::new(db.clone());
    let first = insert_site(&db, "example.com").await;

    let rediscovered = Site::new("EXAMPLE.com", "https://example.com/").with_wordpress(95);
    let stored = sites.upsert(&rediscovered).await.unwrap();

    assert_eq!(stored.id, first.id);
    assert!(stored.is_wordpress);
    assert_eq!(stored.wordpress_confidence, 95);

    let found = sites.find_by_domain("Example.com").await.unwrap().unwrap();
    assert_eq!(found.id, first.id);
    assert!(sites.find_by_domain("other.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_contacts_are_replaced_per_site() {
    let db = setup_db().await;
    let contacts = ContactRepositoryImpl::new(db.clone());
    let site = insert_site(&db, "example.com").await;
    let other = insert_site(&db, "other.com").await;

    contacts
        .replace_for_site(
            site.id,
            &[
                Contact::from_candidate(site.id, candidate("old@example.com", 40)),
                Contact::from_candidate(site.id, candidate("cto@example.com", 90)),
            ],
        )
        .await
        .unwrap();
    contacts
        .replace_for_site(
            other.id,
            &[Contact::from_candidate(other.id, candidate("a@other.com", 10))],
        )
        .await
        .unwrap();

    let stored = contacts.find_by_site(site.id).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].email, "cto@example.com");

    contacts
        .replace_for_site(
            site.id,
            &[Contact::from_candidate(site.id, candidate("New@Example.com", 70))],
        )
        .await
        .unwrap();

    let replaced = contacts.find_by_site(site.id).await.unwrap();
    assert_eq!(replaced.len(), 1);
    assert_eq!(replaced[0].email, "new@example.com");
    assert_eq!(contacts.find_by_site(other.id).await.unwrap().len(), 1);

    contacts.replace_for_site(site.id, &[]).await.unwrap();
    assert!(contacts.find_by_site(site.id).await.unwrap().is_empty());
}
