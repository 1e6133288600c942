//! Schema fixtures shared by the test suites of this workspace.
//!
//! Models a small blog: users with permissions (many-to-many through a pivot)
//! and addresses, posts with a publisher and comments.

use std::sync::Arc;

use crate::schema::{CriteriaSchema, JoinRelationType};

fn build(schema: crate::schema::CriteriaSchemaBuilder) -> Arc<CriteriaSchema> {
    match schema.build() {
        Ok(schema) => schema,
        Err(e) => panic!("fixture schema is invalid: {e}"),
    }
}

pub fn user_schema() -> Arc<CriteriaSchema> {
    build(
        CriteriaSchema::builder("user")
            .alias("users")
            .alias("user")
            .alias("publisher")
            .fields(["uuid", "email", "username", "created_at"])
            .join("permissions", JoinRelationType::ManyToMany)
            .join("addresses", JoinRelationType::OneToMany)
            .join("posts", JoinRelationType::OneToMany),
    )
}

pub fn post_schema() -> Arc<CriteriaSchema> {
    build(
        CriteriaSchema::builder("post")
            .alias("posts")
            .alias("post")
            .fields(["uuid", "title", "body", "user_uuid", "created_at"])
            .join("comments", JoinRelationType::OneToMany)
            .join("publisher", JoinRelationType::ManyToOne),
    )
}

pub fn comment_schema() -> Arc<CriteriaSchema> {
    build(
        CriteriaSchema::builder("post_comment")
            .alias("comments")
            .alias("comment")
            .fields(["uuid", "comment_text", "user_uuid", "post_uuid", "created_at"])
            .join("post", JoinRelationType::ManyToOne)
            .join("user", JoinRelationType::ManyToOne),
    )
}

pub fn permission_schema() -> Arc<CriteriaSchema> {
    build(
        CriteriaSchema::builder("permission")
            .alias("permissions")
            .alias("permission")
            .fields(["uuid", "name", "created_at"])
            .join("users", JoinRelationType::ManyToMany),
    )
}

pub fn address_schema() -> Arc<CriteriaSchema> {
    build(
        CriteriaSchema::builder("address")
            .alias("addresses")
            .alias("address")
            .fields(["uuid", "direction", "user_uuid", "created_at"])
            .join("user", JoinRelationType::ManyToOne),
    )
}
