//! Database facade tests over an in-memory executor
//!
//! The executor records every statement it is given and answers from queued
//! responses, so these tests check which statements run and in what order
//! without a live database.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use dynamic_sql::{
    ConditionBuilder, ConditionOperation, Database, DynamicSource, DynamicSqlError, Entity,
    Executor, LogicalDelete, OracleDialect, OrderBy, PageRequest, Result, SearchAnnotation,
    SqlDialect, Statement, StandardDialect, Where, dynamic_fields,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

// ==================== Fixtures ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Post {
    id: i64,
    title: String,
    published: bool,
}

dynamic_fields!(Post {
    id => |d| d.key(),
    title,
    published,
});

impl Entity for Post {
    const TABLE: &'static str = "posts";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Comment {
    id: i64,
    post_id: i64,
    text: String,
    is_deleted: bool,
}

dynamic_fields!(Comment {
    id => |d| d.key(),
    post_id,
    text,
    is_deleted,
});

impl Entity for Comment {
    const TABLE: &'static str = "comments";

    fn logical_delete() -> Option<LogicalDelete> {
        Some(LogicalDelete::flag("is_deleted"))
    }
}

#[derive(Default)]
struct PostSearch {
    title: Option<String>,
    min_id: Option<i64>,
}

dynamic_fields!(PostSearch {
    title => |d| d.search(SearchAnnotation::new(ConditionOperation::Like)),
    min_id => |d| d.search(SearchAnnotation::new(ConditionOperation::GreaterOrEqual).column("id")),
});

/// Executor that records statements and replays queued results
struct RecordingExecutor {
    dialect: &'static dyn SqlDialect,
    statements: Mutex<Vec<Statement>>,
    scalars: Mutex<VecDeque<Option<i64>>>,
    lists: Mutex<VecDeque<Vec<Value>>>,
    affected: u64,
}

impl RecordingExecutor {
    fn new(dialect: &'static dyn SqlDialect) -> Self {
        Self {
            dialect,
            statements: Mutex::new(Vec::new()),
            scalars: Mutex::new(VecDeque::new()),
            lists: Mutex::new(VecDeque::new()),
            affected: 1,
        }
    }

    fn with_scalar(self, value: Option<i64>) -> Self {
        self.scalars.lock().unwrap().push_back(value);
        self
    }

    fn with_rows(self, rows: Vec<Value>) -> Self {
        self.lists.lock().unwrap().push_back(rows);
        self
    }

    fn record(&self, statement: &Statement) {
        self.statements.lock().unwrap().push(statement.clone());
    }

    fn recorded(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    type Row = Value;

    fn dialect(&self) -> &'static dyn SqlDialect {
        self.dialect
    }

    async fn query_one(&self, statement: &Statement) -> Result<Option<Value>> {
        self.record(statement);
        let rows = self.lists.lock().unwrap().pop_front().unwrap_or_default();
        Ok(rows.into_iter().next())
    }

    async fn query_list(&self, statement: &Statement) -> Result<Vec<Value>> {
        self.record(statement);
        Ok(self.lists.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn execute(&self, statement: &Statement) -> Result<u64> {
        self.record(statement);
        Ok(self.affected)
    }

    async fn execute_scalar(&self, statement: &Statement) -> Result<Option<i64>> {
        self.record(statement);
        Ok(self.scalars.lock().unwrap().pop_front().flatten())
    }
}

fn standard() -> RecordingExecutor {
    RecordingExecutor::new(&StandardDialect)
}

fn post_row(id: i64, title: &str) -> Value {
    json!({ "id": id, "title": title, "published": true })
}

// ==================== Paging ====================

#[tokio::test]
async fn test_page_with_zero_total_skips_page_query() {
    let db = Database::new(standard().with_scalar(Some(0)));

    let page = db
        .query_page::<Post, Post>(Where::None, OrderBy::asc("id"), PageRequest::new(1, 10))
        .await
        .unwrap();

    assert_eq!(page.total_count, 0);
    assert!(page.items.is_empty());

    let recorded = db.executor().recorded();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].sql, "SELECT COUNT(*) FROM \"posts\"");
}

#[tokio::test]
async fn test_page_past_end_skips_page_query() {
    let db = Database::new(standard().with_scalar(Some(15)));

    let page = db
        .query_page::<Post, Post>(Where::None, OrderBy::None, PageRequest::new(3, 10))
        .await
        .unwrap();

    assert_eq!(page.total_count, 15);
    assert!(page.items.is_empty());
    assert_eq!(db.executor().recorded().len(), 1);
}

#[tokio::test]
async fn test_page_shares_where_parameters() {
    let executor = standard()
        .with_scalar(Some(2))
        .with_rows(vec![post_row(1, "Hello"), post_row(2, "Hello")]);
    let db = Database::new(executor);

    let filter = json!({ "title": "Hello" });
    let page = db
        .query_page::<Post, Post>(
            Where::Fields(DynamicSource::from(&filter)),
            OrderBy::desc("id"),
            PageRequest::new(1, 10),
        )
        .await
        .unwrap();

    assert_eq!(page.total_count, 2);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].title, "Hello");

    let recorded = db.executor().recorded();
    assert_eq!(recorded.len(), 2);
    assert_eq!(
        recorded[0].sql,
        "SELECT COUNT(*) FROM \"posts\" WHERE \"title\" = @title"
    );
    assert_eq!(
        recorded[1].sql,
        "SELECT * FROM \"posts\" WHERE \"title\" = @title ORDER BY \"id\" DESC LIMIT 10 OFFSET 0"
    );
    assert_eq!(recorded[0].params, recorded[1].params);
}

#[tokio::test]
async fn test_page_uses_oracle_fetch() {
    let executor = RecordingExecutor::new(&OracleDialect)
        .with_scalar(Some(30))
        .with_rows(vec![post_row(11, "a")]);
    let db = Database::new(executor);

    db.query_page::<Post, Post>(Where::None, OrderBy::asc("id"), PageRequest::new(2, 10))
        .await
        .unwrap();

    let recorded = db.executor().recorded();
    assert_eq!(
        recorded[1].sql,
        "SELECT * FROM \"posts\" ORDER BY \"id\" ASC OFFSET 10 ROWS FETCH NEXT 10 ROWS ONLY"
    );
}

#[tokio::test]
async fn test_count_without_rows_is_zero() {
    let db = Database::new(standard().with_scalar(None));

    let count = db.query_count::<Post>(Where::Raw("published".to_string())).await.unwrap();

    assert_eq!(count, 0);
    assert_eq!(
        db.executor().recorded()[0].sql,
        "SELECT COUNT(*) FROM \"posts\" WHERE published"
    );
}

// ==================== Queries ====================

#[tokio::test]
async fn test_query_one_limits_and_materializes() {
    let db = Database::new(standard().with_rows(vec![post_row(7, "Seven")]));

    let post: Option<Post> = db
        .query_one::<Post, Post>(Where::None, OrderBy::desc("id"))
        .await
        .unwrap();

    assert_eq!(
        post,
        Some(Post {
            id: 7,
            title: "Seven".to_string(),
            published: true
        })
    );
    assert_eq!(
        db.executor().recorded()[0].sql,
        "SELECT * FROM \"posts\" ORDER BY \"id\" DESC LIMIT 1"
    );
}

#[tokio::test]
async fn test_query_list_with_search_condition() {
    let db = Database::new(standard().with_rows(vec![]));

    let search = PostSearch {
        title: Some("rust".to_string()),
        min_id: Some(100),
    };
    let condition = db.search::<Post>(&DynamicSource::object(&search)).build();
    let posts: Vec<Post> = db
        .query_list::<Post, Post>(Where::Fragment(condition), OrderBy::None)
        .await
        .unwrap();

    assert!(posts.is_empty());

    let recorded = db.executor().recorded();
    assert_eq!(
        recorded[0].sql,
        "SELECT * FROM \"posts\" WHERE \"posts\".\"title\" like @p0 and \"posts\".\"id\">=@p1"
    );
    assert_eq!(recorded[0].params.get("p0"), Some(&json!("%rust%")));
    assert_eq!(recorded[0].params.get("p1"), Some(&json!(100)));
}

#[tokio::test]
async fn test_row_shape_mismatch_is_json_error() {
    let db = Database::new(standard().with_rows(vec![json!({ "id": "not a number" })]));

    let err = db
        .query_list::<Post, Post>(Where::None, OrderBy::None)
        .await
        .unwrap_err();

    assert!(matches!(err, DynamicSqlError::Json(_)));
}

// ==================== Commands ====================

#[tokio::test]
async fn test_insert_many_sums_affected_rows() {
    let db = Database::new(standard());
    let posts = vec![
        Post {
            id: 1,
            title: "one".to_string(),
            published: false,
        },
        Post {
            id: 2,
            title: "two".to_string(),
            published: true,
        },
    ];

    let affected = db.insert_many(&posts).await.unwrap();

    assert_eq!(affected, 2);
    let recorded = db.executor().recorded();
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[0].sql, recorded[1].sql);
    assert_eq!(
        recorded[0].sql,
        "INSERT INTO \"posts\" (\"id\", \"title\", \"published\") VALUES (@id, @title, @published)"
    );
}

#[tokio::test]
async fn test_insert_many_empty_is_error() {
    let db = Database::new(standard());

    let err = db.insert_many::<Post>(&[]).await.unwrap_err();

    assert!(matches!(err, DynamicSqlError::EmptyInput(_)));
    assert!(db.executor().recorded().is_empty());
}

#[tokio::test]
async fn test_update_without_filter_or_entity_runs_nothing() {
    let db = Database::new(standard());
    let data = json!({ "title": "renamed" });

    let affected = db
        .update::<Post>(DynamicSource::from(&data), Where::None)
        .await
        .unwrap();

    assert_eq!(affected, 0);
    assert!(db.executor().recorded().is_empty());
}

#[tokio::test]
async fn test_update_entity_matches_on_key() {
    let db = Database::new(standard());
    let post = Post {
        id: 3,
        title: "edited".to_string(),
        published: true,
    };

    db.update_entity(&post).await.unwrap();

    let recorded = db.executor().recorded();
    assert_eq!(
        recorded[0].sql,
        "UPDATE \"posts\" SET \"title\" = @title, \"published\" = @published WHERE \"id\" = @w_id"
    );
    assert_eq!(recorded[0].params.get("w_id"), Some(&json!(3)));
}

#[tokio::test]
async fn test_update_with_fragment_filter() {
    let db = Database::new(standard());
    let data = json!({ "published": false });
    let filter = ConditionBuilder::standard()
        .expression("\"id\"", "<", 10)
        .build();

    db.update::<Post>(DynamicSource::from(&data), Where::Fragment(filter))
        .await
        .unwrap();

    let recorded = db.executor().recorded();
    assert_eq!(
        recorded[0].sql,
        "UPDATE \"posts\" SET \"published\" = @published WHERE \"id\"<@p0"
    );
    assert_eq!(recorded[0].params.len(), 2);
}

// ==================== Delete / Restore ====================

#[tokio::test]
async fn test_physical_delete() {
    let db = Database::new(standard());
    let filter = json!({ "id": 9 });

    db.delete::<Post>(Where::Fields(DynamicSource::from(&filter)))
        .await
        .unwrap();

    assert_eq!(
        db.executor().recorded()[0].sql,
        "DELETE FROM \"posts\" WHERE \"id\" = @id"
    );
}

#[tokio::test]
async fn test_delete_without_filter_runs_nothing() {
    let db = Database::new(standard());

    let affected = db.delete::<Post>(Where::None).await.unwrap();

    assert_eq!(affected, 0);
    assert!(db.executor().recorded().is_empty());
}

#[tokio::test]
async fn test_logical_delete_and_restore_flip_flag() {
    let db = Database::new(standard());
    let filter = json!({ "post_id": 4 });

    db.delete::<Comment>(Where::Fields(DynamicSource::from(&filter)))
        .await
        .unwrap();
    db.restore::<Comment>(Where::Fields(DynamicSource::from(&filter)))
        .await
        .unwrap();

    let recorded = db.executor().recorded();
    let expected = "UPDATE \"comments\" SET \"is_deleted\" = @ld_is_deleted WHERE \"post_id\" = @post_id";
    assert_eq!(recorded[0].sql, expected);
    assert_eq!(recorded[1].sql, expected);
    assert_eq!(recorded[0].params.get("ld_is_deleted"), Some(&json!(true)));
    assert_eq!(recorded[1].params.get("ld_is_deleted"), Some(&json!(false)));
    assert_eq!(recorded[1].params.get("post_id"), Some(&json!(4)));
}

#[tokio::test]
async fn test_restore_unsupported_without_logical_delete() {
    let db = Database::new(standard());
    let filter = json!({ "id": 1 });

    let err = db
        .restore::<Post>(Where::Fields(DynamicSource::from(&filter)))
        .await
        .unwrap_err();

    assert!(matches!(err, DynamicSqlError::UnsupportedOperation(_)));
    assert!(db.executor().recorded().is_empty());
}

// ==================== Conditions ====================

#[test]
fn test_from_dynamic_is_repeatable() {
    let db = Database::new(standard());
    let filter = json!({ "title": "same", "published": true });

    let first = ConditionBuilder::from_dynamic::<Post>(
        db.dialect(),
        db.registry(),
        &DynamicSource::from(&filter),
    )
    .build();
    let second = ConditionBuilder::from_dynamic::<Post>(
        db.dialect(),
        db.registry(),
        &DynamicSource::from(&filter),
    )
    .build();

    assert_eq!(first, second);
    assert_eq!(
        first.sql,
        "\"posts\".\"title\"=@p0 and \"posts\".\"published\"=@p1"
    );
}

#[test]
fn test_search_shape_is_cached_once() {
    let db = Database::new(standard());
    let search = PostSearch::default();

    db.search::<Post>(&DynamicSource::object(&search));
    db.search::<Post>(&DynamicSource::object(&search));

    assert_eq!(db.registry().cached_shapes(), 1);
}
