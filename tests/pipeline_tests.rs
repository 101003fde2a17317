//! End-to-end pipeline tests against a real git repository

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use catalog_notifier::dispatch::{DeliveryMode, WebhookRequest};
use catalog_notifier::error::DeliveryError;
use catalog_notifier::{
    aggregate, dispatch, filter_notifications, CommitRange, DetectContext, Detector,
    DispatchOptions, FsCatalog, GitRepository, Notification, NotificationKind, NotifierConfig,
    Stage, Vcs, WebhookTransport,
};
use git2::{Commit, IndexAddOption, Repository, Signature};
use tempfile::TempDir;

const EVENT: &str = "events/GetInventoryList/index.mdx";
const EVENT_SCHEMA: &str = "events/GetInventoryList/schema.json";
const INVENTORY: &str = "services/InventoryService/index.mdx";
const PAYMENTS_EVENT: &str = "events/PaymentProcessed/index.mdx";
const PAYMENTS_SCHEMA: &str = "events/PaymentProcessed/schema.json";
const GATEWAY: &str = "domains/Payments/services/PaymentGatewayService/index.mdx";

/// A git repository whose `catalog/` directory is an EventCatalog
struct Fixture {
    _dir: TempDir,
    repo: Repository,
    catalog: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        let catalog = dir.path().canonicalize().unwrap().join("catalog");

        let fixture = Self {
            _dir: dir,
            repo,
            catalog,
        };
        fixture.write("eventcatalog.config.js", "export default {};\n");
        fixture.write("users/dboyne.mdx", "---\nid: dboyne\nname: David Boyne\n---\n");
        fixture.write(
            EVENT,
            concat!(
                "---\nid: GetInventoryList\nname: Get Inventory List\nversion: 0.0.1\n",
                "owners:\n  - dboyne\nschemaPath: schema.json\n---\n",
            ),
        );
        fixture.write(EVENT_SCHEMA, "{\n  \"type\": \"object\"\n}\n");
        fixture.write(
            PAYMENTS_EVENT,
            concat!(
                "---\nid: PaymentProcessed\nname: Payment Processed\nversion: 1.0.0\n",
                "owners:\n  - payments\nschemaPath: schema.json\n---\n",
            ),
        );
        fixture.write(
            PAYMENTS_SCHEMA,
            "{\n  \"amount\": \"number\",\n  \"currency\": \"string\"\n}\n",
        );
        fixture.write(GATEWAY, &service("PaymentGatewayService", &["PaymentProcessed"]));
        fixture.write(INVENTORY, &service("InventoryService", &[]));
        fixture.commit("Initial catalog");
        fixture
    }

    fn write(&self, rel: &str, content: &str) {
        let path = self.catalog.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn commit(&self, message: &str) {
        let mut index = self.repo.index().unwrap();
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None).unwrap();
        index.write().unwrap();
        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("Catalog Bot", "bot@example.com").unwrap();

        let parent: Option<Commit<'_>> =
            self.repo.head().ok().map(|h| h.peel_to_commit().unwrap());
        let parents: Vec<&Commit<'_>> = parent.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap();
    }

    fn detect(&self, range: &str) -> Vec<Notification> {
        let repo = GitRepository::discover(&self.catalog).unwrap();
        let range = CommitRange::parse(range).unwrap();
        let changed = repo.changed_files(&range).unwrap();
        let catalog = FsCatalog::open(&self.catalog).unwrap();
        let ctx = DetectContext::new(&catalog, &repo, &self.catalog, &changed, &range);
        aggregate(&Detector::ALL, &ctx).unwrap()
    }
}

fn service(id: &str, receives: &[&str]) -> String {
    let mut text = format!("---\nid: {}\nversion: 0.0.1\nowners:\n  - dboyne\n", id);
    if !receives.is_empty() {
        text.push_str("receives:\n");
        for message in receives {
            text.push_str(&format!("  - id: {}\n", message));
        }
    }
    text.push_str("---\n\n## Architecture\n");
    text
}

fn config(policy: &str, subscriber: &str, kinds: &[&str]) -> NotifierConfig {
    let events: String = kinds.iter().map(|k| format!("      - {}\n", k)).collect();
    let yaml = format!(
        r#"version: 1.0.0
eventcatalog_url: https://eventcatalog.example.com
match_policy: {policy}
owners:
  {subscriber}:
    events:
{events}    channels:
      - type: slack
        webhook: https://hooks.example.com/{subscriber}
"#
    );
    NotifierConfig::from_yaml_str(&yaml, |_| None).unwrap()
}

/// Fails the test if anything reaches the network
struct NoNetwork;

#[async_trait]
impl WebhookTransport for NoNetwork {
    async fn post(&self, request: &WebhookRequest) -> Result<(), DeliveryError> {
        panic!("unexpected delivery to {}", request.endpoint);
    }
}

fn ids(notifications: &[Notification]) -> Vec<(String, String, String)> {
    notifications
        .iter()
        .map(|n| (n.kind.to_string(), n.resource.id.clone(), n.consumer.id.clone()))
        .collect()
}

#[test]
fn test_consumer_added() {
    let fixture = Fixture::new();
    fixture.write(INVENTORY, &service("InventoryService", &["GetInventoryList"]));
    fixture.commit("InventoryService consumes GetInventoryList");

    let notifications = fixture.detect("HEAD~1..HEAD");
    assert_eq!(notifications.len(), 1);

    let n = &notifications[0];
    assert_eq!(n.kind, NotificationKind::ConsumerAdded);
    assert_eq!(n.resource.id, "GetInventoryList");
    assert_eq!(n.resource.owners[0].id, "dboyne");
    assert_eq!(n.resource.owners[0].name.as_deref(), Some("David Boyne"));
    assert_eq!(n.consumer.id, "InventoryService");
    assert_eq!(n.metadata.catalog_path, fixture.catalog);
}

#[test]
fn test_consumer_added_routing_policies() {
    let fixture = Fixture::new();
    fixture.write(INVENTORY, &service("InventoryService", &["GetInventoryList"]));
    fixture.commit("InventoryService consumes GetInventoryList");
    let notifications = fixture.detect("HEAD~1..HEAD");

    let interest = config("interest", "payments-team", &["consumer-added"]);
    assert_eq!(filter_notifications(&interest, notifications.clone()).len(), 1);

    let not_owner = config("ownership", "payments-team", &["consumer-added"]);
    assert!(filter_notifications(&not_owner, notifications.clone()).is_empty());

    let owner = config("ownership", "dboyne", &["consumer-added"]);
    assert_eq!(filter_notifications(&owner, notifications).len(), 1);
}

#[test]
fn test_consumer_removed() {
    let fixture = Fixture::new();
    fixture.write(GATEWAY, &service("PaymentGatewayService", &[]));
    fixture.commit("PaymentGatewayService stops consuming PaymentProcessed");

    assert_eq!(
        ids(&fixture.detect("HEAD~1..HEAD")),
        vec![(
            "consumer-removed".to_string(),
            "PaymentProcessed".to_string(),
            "PaymentGatewayService".to_string()
        )]
    );
}

#[test]
fn test_schema_changed() {
    let fixture = Fixture::new();
    fixture.write(
        PAYMENTS_SCHEMA,
        concat!(
            "{\n  \"amount\": \"number\",\n  \"currency\": \"string\",\n",
            "  \"reference\": \"string\"\n}\n",
        ),
    );
    fixture.commit("Add payment reference");

    let notifications = fixture.detect("HEAD~1..HEAD");
    assert_eq!(notifications.len(), 1);

    let n = &notifications[0];
    assert_eq!(n.kind, NotificationKind::SubscribedSchemaChanged);
    assert_eq!(n.resource.id, "PaymentProcessed");
    assert_eq!(n.consumer.id, "PaymentGatewayService");

    let change = n.schema_change.as_ref().unwrap();
    assert!(change.diff.contains("```diff"));
    assert!(change.diff.contains("+  \"reference\": \"string\""));
    assert!(change.after.ends_with('}'));
}

#[test]
fn test_new_schema_is_not_a_change() {
    let fixture = Fixture::new();
    fixture.write(
        "events/OrderPlaced/index.mdx",
        "---\nid: OrderPlaced\nversion: 0.0.1\nowners:\n  - dboyne\nschemaPath: schema.json\n---\n",
    );
    fixture.write("events/OrderPlaced/schema.json", "{}\n");
    fixture.commit("Add OrderPlaced");

    assert!(fixture.detect("HEAD~1..HEAD").is_empty());
}

#[test]
fn test_payload_next_to_unlinked_message_is_not_a_schema_change() {
    let fixture = Fixture::new();
    fixture.write(
        "events/OrderPlaced/index.mdx",
        "---\nid: OrderPlaced\nversion: 0.0.1\nowners:\n  - dboyne\n---\n",
    );
    fixture.write("events/OrderPlaced/example-payload.json", "{\"id\": 1}\n");
    fixture.write(INVENTORY, &service("InventoryService", &["OrderPlaced"]));
    fixture.commit("Add OrderPlaced with an example payload");
    fixture.write("events/OrderPlaced/example-payload.json", "{\"id\": 2}\n");
    fixture.commit("Update the example payload");

    assert!(fixture.detect("HEAD~1..HEAD").is_empty());
}

#[test]
fn test_three_dot_range_matches_two_dot_on_linear_history() {
    let fixture = Fixture::new();
    fixture.write(INVENTORY, &service("InventoryService", &["GetInventoryList"]));
    fixture.write(PAYMENTS_SCHEMA, "{\n  \"amount\": \"integer\"\n}\n");
    fixture.commit("Consume inventory and tighten payments");

    let two_dot = fixture.detect("HEAD~1..HEAD");
    let three_dot = fixture.detect("HEAD~1...HEAD");
    assert_eq!(two_dot.len(), 2);
    assert_eq!(ids(&two_dot), ids(&three_dot));
}

#[test]
fn test_files_outside_range_are_ignored() {
    let fixture = Fixture::new();
    fixture.write(INVENTORY, &service("InventoryService", &["GetInventoryList"]));
    fixture.commit("InventoryService consumes GetInventoryList");
    fixture.write("README.md", "# Catalog\n");
    fixture.commit("Docs");

    assert!(fixture.detect("HEAD~1..HEAD").is_empty());
    assert_eq!(fixture.detect("HEAD~2..HEAD").len(), 1);
}

#[tokio::test]
async fn test_preview_dispatch_end_to_end() {
    let fixture = Fixture::new();
    fixture.write(INVENTORY, &service("InventoryService", &["GetInventoryList"]));
    fixture.write(PAYMENTS_SCHEMA, "{\n  \"amount\": \"integer\"\n}\n");
    fixture.commit("Consume inventory and tighten payments");

    let config = config(
        "interest",
        "payments-team",
        &["consumer-added", "subscribed-schema-changed"],
    );
    let notifications = filter_notifications(&config, fixture.detect("HEAD~1..HEAD"));
    let options = DispatchOptions {
        preview: true,
        stage: Stage::Draft,
        action_url: Some("https://github.com/org/catalog/pull/7".to_string()),
    };

    let report = dispatch(&config, &notifications, &options, &NoNetwork).await.unwrap();
    assert_eq!(report.deliveries.len(), 2);
    assert!(report.deliveries.iter().all(|d| d.mode == DeliveryMode::Previewed));

    let schema = report
        .deliveries
        .iter()
        .find(|d| d.kind == NotificationKind::SubscribedSchemaChanged)
        .unwrap();
    assert_eq!(schema.request.endpoint, "https://hooks.example.com/payments-team");
    let body: serde_json::Value = serde_json::from_str(&schema.request.body).unwrap();
    assert_eq!(body["text"], "🔄 Proposed Schema Change: Payment Processed");
    let fields = body["attachments"][0]["fields"].as_array().unwrap();
    assert!(fields
        .iter()
        .any(|f| f["value"] == "<https://github.com/org/catalog/pull/7|View Schema Changes>"));
}

#[test]
fn test_not_a_repository() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        GitRepository::discover(dir.path()),
        Err(catalog_notifier::error::GitError::NotARepository(_))
    ));
}
