mod common;

use assert_matches::assert_matches;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::TestApp;
use storefront_api::{
    entities::ReturnStatus,
    errors::ServiceError,
    services::{
        orders::PlaceOrderRequest,
        returns::{CreateReturnRequest, UpdateReturnStatusRequest},
    },
};

/// Places and completes an order worth 500,000 (sub total 485,000 plus
/// 15,000 shipping), returning (user, order_id, product_id).
async fn completed_order(app: &TestApp) -> (Uuid, Uuid, Uuid) {
    let user = Uuid::new_v4();
    let item = app.seed_product("Armchair", dec!(485000), 6).await;
    let shipping = app.seed_shipping_method("Freight", dec!(15000)).await;
    app.add_to_cart(user, item, 1).await;

    let receipt = app
        .state
        .orders
        .place_order(PlaceOrderRequest {
            user_id: user,
            shipping_method_id: shipping,
            shipping_address: "12 Elm Street".to_string(),
            phone: "555-0100".to_string(),
            customer_name: None,
            coupon_code: None,
            payment_method: None,
        })
        .await
        .expect("failed to place fixture order");

    app.complete_order(receipt.order_id).await;
    (user, receipt.order_id, item)
}

fn return_request(order_id: Uuid) -> CreateReturnRequest {
    CreateReturnRequest {
        order_id,
        reason: Some("Damaged on arrival".to_string()),
        refund_amount: None,
    }
}

fn status_update(status: ReturnStatus) -> UpdateReturnStatusRequest {
    UpdateReturnStatusRequest {
        status,
        note: None,
        refund_amount: None,
    }
}

#[tokio::test]
async fn return_on_uncompleted_order_is_not_eligible() {
    let app = TestApp::new().await;
    let user = Uuid::new_v4();
    let item = app.seed_product("Lamp", dec!(70000), 4).await;
    let shipping = app.seed_shipping_method("Standard", dec!(15000)).await;
    app.add_to_cart(user, item, 1).await;

    let receipt = app
        .state
        .orders
        .place_order(PlaceOrderRequest {
            user_id: user,
            shipping_method_id: shipping,
            shipping_address: "12 Elm Street".to_string(),
            phone: "555-0100".to_string(),
            customer_name: None,
            coupon_code: None,
            payment_method: None,
        })
        .await
        .unwrap();

    // Still Pending: not returnable.
    let result = app
        .state
        .returns
        .create_return(user, return_request(receipt.order_id))
        .await;
    assert_matches!(result, Err(ServiceError::OrderNotEligible(_)));
}

#[tokio::test]
async fn omitted_refund_defaults_to_the_full_order_total() {
    let app = TestApp::new().await;
    let (user, order_id, _) = completed_order(&app).await;

    let created = app
        .state
        .returns
        .create_return(user, return_request(order_id))
        .await
        .unwrap();

    assert_eq!(created.refund_amount, dec!(500000));
    assert_eq!(created.status, ReturnStatus::Requested);
    assert_eq!(created.order_id, order_id);

    // Creation is logged with no prior status.
    let detail = app
        .state
        .returns
        .get_return_detail(created.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(detail.logs.len(), 1);
    assert_eq!(detail.logs[0].old_status, None);
    assert_eq!(detail.logs[0].new_status, ReturnStatus::Requested);
    assert_eq!(detail.logs[0].changed_by, Some(user));
}

#[tokio::test]
async fn refund_is_clamped_to_the_order_total_on_create() {
    let app = TestApp::new().await;
    let (user, order_id, _) = completed_order(&app).await;

    let mut request = return_request(order_id);
    request.refund_amount = Some(dec!(900000));
    let created = app.state.returns.create_return(user, request).await.unwrap();

    assert_eq!(created.refund_amount, dec!(500000));
}

#[tokio::test]
async fn non_positive_refund_falls_back_to_the_order_total() {
    let app = TestApp::new().await;
    let (user, order_id, _) = completed_order(&app).await;

    let mut request = return_request(order_id);
    request.refund_amount = Some(dec!(-25000));
    let created = app.state.returns.create_return(user, request).await.unwrap();

    assert_eq!(created.refund_amount, dec!(500000));
}

#[tokio::test]
async fn someone_elses_order_cannot_be_returned() {
    let app = TestApp::new().await;
    let (_owner, order_id, _) = completed_order(&app).await;

    let stranger = Uuid::new_v4();
    let result = app
        .state
        .returns
        .create_return(stranger, return_request(order_id))
        .await;
    assert_matches!(result, Err(ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn a_second_return_for_the_same_order_is_rejected() {
    let app = TestApp::new().await;
    let (user, order_id, _) = completed_order(&app).await;

    app.state
        .returns
        .create_return(user, return_request(order_id))
        .await
        .unwrap();

    let result = app
        .state
        .returns
        .create_return(user, return_request(order_id))
        .await;
    assert_matches!(result, Err(ServiceError::DuplicateReturn(id)) if id == order_id);
}

#[tokio::test]
async fn unknown_order_reports_not_found() {
    let app = TestApp::new().await;
    let result = app
        .state
        .returns
        .create_return(Uuid::new_v4(), return_request(Uuid::new_v4()))
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn every_status_update_appends_exactly_one_log_entry() {
    let app = TestApp::new().await;
    let (user, order_id, _) = completed_order(&app).await;
    let admin = Uuid::new_v4();

    let created = app
        .state
        .returns
        .create_return(user, return_request(order_id))
        .await
        .unwrap();

    let mut update = status_update(ReturnStatus::Approved);
    update.note = Some("Photos verified".to_string());
    let updated = app
        .state
        .returns
        .update_status(created.id, update, admin)
        .await
        .unwrap();

    assert_eq!(updated.status, ReturnStatus::Approved);
    assert_eq!(updated.processed_by, Some(admin));
    assert!(updated.processed_at.is_some());

    let detail = app
        .state
        .returns
        .get_return_detail(created.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(detail.logs.len(), 2);

    // Newest first; the head entry records the transition just made, and
    // the stored status always mirrors it.
    assert_eq!(detail.logs[0].old_status, Some(ReturnStatus::Requested));
    assert_eq!(detail.logs[0].new_status, ReturnStatus::Approved);
    assert_eq!(detail.logs[0].note.as_deref(), Some("Photos verified"));
    assert_eq!(detail.logs[0].changed_by, Some(admin));
    assert_eq!(detail.request.status, detail.logs[0].new_status);
}

#[tokio::test]
async fn the_log_replays_the_full_status_history() {
    let app = TestApp::new().await;
    let (user, order_id, _) = completed_order(&app).await;
    let admin = Uuid::new_v4();

    let created = app
        .state
        .returns
        .create_return(user, return_request(order_id))
        .await
        .unwrap();

    let history = [
        ReturnStatus::Approved,
        ReturnStatus::Refunded,
        // Free transitions: administrators may reopen a refunded return.
        ReturnStatus::Requested,
        ReturnStatus::Rejected,
    ];
    for status in history {
        app.state
            .returns
            .update_status(created.id, status_update(status), admin)
            .await
            .unwrap();
    }

    let detail = app
        .state
        .returns
        .get_return_detail(created.id)
        .await
        .unwrap()
        .unwrap();

    // N updates plus the creation entry, newest first.
    assert_eq!(detail.logs.len(), history.len() + 1);

    let newest_first: Vec<ReturnStatus> =
        detail.logs.iter().map(|log| log.new_status).collect();
    assert_eq!(
        newest_first,
        vec![
            ReturnStatus::Rejected,
            ReturnStatus::Requested,
            ReturnStatus::Refunded,
            ReturnStatus::Approved,
            ReturnStatus::Requested,
        ]
    );

    // Each entry's old status chains to the next-older entry's new status.
    for pair in detail.logs.windows(2) {
        assert_eq!(pair[0].old_status, Some(pair[1].new_status));
    }
    assert_eq!(detail.logs.last().unwrap().old_status, None);
    assert_eq!(detail.request.status, ReturnStatus::Rejected);
}

#[tokio::test]
async fn refund_override_is_clamped_and_retained() {
    let app = TestApp::new().await;
    let (user, order_id, _) = completed_order(&app).await;
    let admin = Uuid::new_v4();

    let created = app
        .state
        .returns
        .create_return(user, return_request(order_id))
        .await
        .unwrap();

    // A valid override replaces the stored amount.
    let mut update = status_update(ReturnStatus::Approved);
    update.refund_amount = Some(dec!(120000));
    let updated = app
        .state
        .returns
        .update_status(created.id, update, admin)
        .await
        .unwrap();
    assert_eq!(updated.refund_amount, dec!(120000));

    // An absent or non-positive override keeps the prior amount.
    let mut update = status_update(ReturnStatus::Refunded);
    update.refund_amount = Some(dec!(0));
    let updated = app
        .state
        .returns
        .update_status(created.id, update, admin)
        .await
        .unwrap();
    assert_eq!(updated.refund_amount, dec!(120000));

    // Overrides beyond the order total clamp to it.
    let mut update = status_update(ReturnStatus::Refunded);
    update.refund_amount = Some(dec!(750000));
    let updated = app
        .state
        .returns
        .update_status(created.id, update, admin)
        .await
        .unwrap();
    assert_eq!(updated.refund_amount, dec!(500000));
}

#[tokio::test]
async fn updating_an_unknown_return_reports_not_found() {
    let app = TestApp::new().await;
    let result = app
        .state
        .returns
        .update_status(
            Uuid::new_v4(),
            status_update(ReturnStatus::Approved),
            Uuid::new_v4(),
        )
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn refunding_does_not_restock_inventory() {
    let app = TestApp::new().await;
    let (user, order_id, product_id) = completed_order(&app).await;
    let admin = Uuid::new_v4();
    let stock_after_sale = app.stock_of(product_id).await;

    let created = app
        .state
        .returns
        .create_return(user, return_request(order_id))
        .await
        .unwrap();

    for status in [ReturnStatus::Approved, ReturnStatus::Refunded] {
        app.state
            .returns
            .update_status(created.id, status_update(status), admin)
            .await
            .unwrap();
    }

    // Refund execution is out of scope; stock stays where the sale left it.
    assert_eq!(app.stock_of(product_id).await, stock_after_sale);
}

#[tokio::test]
async fn listings_scope_to_the_requesting_user() {
    let app = TestApp::new().await;
    let (user, order_id, _) = completed_order(&app).await;
    let (other_user, other_order_id, _) = completed_order(&app).await;

    let mine = app
        .state
        .returns
        .create_return(user, return_request(order_id))
        .await
        .unwrap();
    app.state
        .returns
        .create_return(other_user, return_request(other_order_id))
        .await
        .unwrap();

    let listed = app.state.returns.list_returns_for_user(user).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, mine.id);

    let (all, total) = app.state.returns.list_returns(1, 20).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn refund_amount_stays_within_bounds_across_the_workflow() {
    let app = TestApp::new().await;
    let (user, order_id, _) = completed_order(&app).await;
    let admin = Uuid::new_v4();

    let mut request = return_request(order_id);
    request.refund_amount = Some(dec!(250000));
    let created = app.state.returns.create_return(user, request).await.unwrap();
    assert_eq!(created.refund_amount, dec!(250000));

    let mut update = status_update(ReturnStatus::Approved);
    update.refund_amount = Some(dec!(999999));
    let updated = app
        .state
        .returns
        .update_status(created.id, update, admin)
        .await
        .unwrap();

    assert!(updated.refund_amount > Decimal::ZERO);
    assert!(updated.refund_amount <= dec!(500000));
}
