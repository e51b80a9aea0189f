//! End-to-end order flows through the service on in-memory backends.

use std::sync::Arc;

use common::AggregateId;
use domain::{CustomerId, Location, OrderError, OrderItem, OrderStatus, TrackingNumber};
use event_store::{EventStore, InMemoryEventStore, Version};
use orders::{OrderService, ServiceError};
use projections::{EventBus, InMemoryEventBus, InMemoryOrderRepository, OrderFilter};

async fn service() -> (OrderService<InMemoryEventStore>, InMemoryEventStore) {
    let store = InMemoryEventStore::new();
    let repo = InMemoryOrderRepository::new();
    let bus = InMemoryEventBus::new();
    bus.subscribe(Arc::new(repo.clone()), &[]).await;
    (
        OrderService::new(store.clone(), Arc::new(repo), Arc::new(bus)),
        store,
    )
}

fn location(city: &str) -> Location {
    Location::new("12 Harbour Rd", city, 1.0, 2.0)
}

async fn create(
    service: &OrderService<InMemoryEventStore>,
    customer: &str,
) -> (AggregateId, TrackingNumber) {
    service
        .create_order(
            CustomerId::new(customer),
            location("Hai Phong"),
            location("Can Tho"),
            vec![OrderItem::new("SKU-9", "Pallet", 2, 120.0, 80.0)],
        )
        .await
        .unwrap()
}

mod lifecycle {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn create_update_history_and_rejected_cancel() {
        let (service, _) = service().await;

        let (id, tracking) = create(&service, "C1").await;
        assert!(tracking.as_str().starts_with("TRK-"));
        assert_eq!(service.get_order(id).await.unwrap().status, OrderStatus::Created);

        service
            .update_order_status(id, OrderStatus::InTransit, None, Some("left warehouse".into()))
            .await
            .unwrap();

        let history = service.get_order_history(id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].prev_status, Some(OrderStatus::Created));
        assert_eq!(history[1].status, Some(OrderStatus::InTransit));
        assert_eq!(history[1].note.as_deref(), Some("left warehouse"));

        service
            .update_order_status(id, OrderStatus::Delivered, Some(location("Can Tho")), None)
            .await
            .unwrap();

        let err = service
            .cancel_order(id, Some("customer request".into()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(OrderError::CannotCancelDelivered)
        ));

        let view = service.get_order(id).await.unwrap();
        assert_eq!(view.status, OrderStatus::Delivered);
        assert_eq!(service.get_order_history(id).await.unwrap().len(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancelled_order_refuses_status_updates() {
        let (service, store) = service().await;
        let (id, _) = create(&service, "C1").await;

        service.cancel_order(id, None).await.unwrap();
        let err = service
            .update_order_status(id, OrderStatus::Processing, None, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ServiceError::Validation(OrderError::InvalidStateTransition { .. })
        ));
        assert_eq!(store.get_aggregate_version(id).await.unwrap(), Some(Version::new(2)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn read_model_matches_replayed_aggregate() {
        let (service, _) = service().await;
        let (id, _) = create(&service, "C1").await;

        service
            .update_order_status(id, OrderStatus::Processing, None, Some("packed".into()))
            .await
            .unwrap();
        service.add_order_note(id, "fragile".into()).await.unwrap();
        let live = service
            .update_order_status(id, OrderStatus::OutForDelivery, Some(location("Hue")), None)
            .await
            .unwrap();

        let view = service.get_order(id).await.unwrap();
        assert_eq!(view.status, live.status());
        assert_eq!(view.notes, live.notes());
        assert_eq!(view.current_location.as_ref(), live.current_location());
        assert_eq!(view.notes, vec!["packed".to_string(), "fragile".to_string()]);
    }
}

mod queries {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn list_orders_filters_by_customer() {
        let (service, _) = service().await;
        for _ in 0..3 {
            create(&service, "ALICE").await;
        }
        for _ in 0..2 {
            create(&service, "BOB").await;
        }

        let page = service
            .list_orders(OrderFilter::new().customer(CustomerId::new("ALICE")).limit(2))
            .await
            .unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert!(page.items.iter().all(|o| o.customer_id.as_str() == "ALICE"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lookup_by_tracking_number() {
        let (service, _) = service().await;
        let (id, tracking) = create(&service, "C1").await;

        let view = service.get_order_by_tracking(tracking.as_str()).await.unwrap();
        assert_eq!(view.id, id);

        let err = service.get_order_by_tracking("TRK-ZZZZZZZZ").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_produce_gap_free_versions() {
        let (service, store) = service().await;
        let service = Arc::new(service);
        let (id, _) = create(&service, "C1").await;

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    service
                        .add_order_note(id, format!("note {i}"))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let versions: Vec<i64> = store
            .get_events_for_aggregate(id)
            .await
            .unwrap()
            .iter()
            .map(|e| e.version.as_i64())
            .collect();
        assert_eq!(versions, (1..=21).collect::<Vec<_>>());
    }
}
