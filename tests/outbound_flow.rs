mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{body_to_string, TestApp, DEFAULT_CALLER_ID};

const CALLEE: &str = "+15557770000";

#[tokio::test]
async fn client_call_dials_number_with_agent_caller_id() -> Result<()> {
    let app = TestApp::new()?;
    let alice = app
        .store
        .add_user("Alice", "agent-alice", Some("+15551110000"), None)
        .await;
    let contact = app.store.add_contact("Pat Customer", CALLEE).await;

    let response = app
        .post_form(
            "/twiml/outbound",
            &[("CallSid", "CA800"), ("From", "client:agent-alice"), ("To", CALLEE)],
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let xml = body_to_string(response.into_body()).await?;
    assert!(xml.contains("callerId=\"+15551110000\""));
    assert!(xml.contains(">+15557770000</Number>"));
    assert!(xml.contains("record=\"record-from-answer-dual\""));

    let call = app.store.call("CA800").await.expect("call row");
    assert_eq!(call.direction, "outbound");
    assert_eq!(call.status, "initiated");
    assert_eq!(call.from_number, "+15551110000");
    assert_eq!(call.to_number, CALLEE);
    assert_eq!(call.from_user_id, Some(alice.id));
    assert_eq!(call.to_user_id, None);

    app.post_form(
        "/twiml/status",
        &[
            ("CallSid", "CA800"),
            ("CallStatus", "completed"),
            ("CallDuration", "18"),
            ("From", "client:agent-alice"),
            ("To", CALLEE),
        ],
    )
    .await?;

    let communications = app.store.communications().await;
    assert_eq!(communications.len(), 1);
    let entry = &communications[0];
    assert_eq!(entry.direction, "outbound");
    assert_eq!(entry.user_id, Some(alice.id));
    assert_eq!(entry.contact_id, Some(contact.id));
    assert_eq!(entry.to_address, CALLEE);
    assert_eq!(entry.duration, Some(18));
    Ok(())
}

#[tokio::test]
async fn agent_without_direct_line_uses_default_caller_id() -> Result<()> {
    let app = TestApp::new()?;
    app.store.add_user("Bob", "agent-bob", None, None).await;

    let response = app
        .post_form(
            "/twiml/outbound",
            &[("CallSid", "CA801"), ("From", "client:agent-bob"), ("To", CALLEE)],
        )
        .await?;
    let xml = body_to_string(response.into_body()).await?;
    assert!(xml.contains(&format!("callerId=\"{DEFAULT_CALLER_ID}\"")));
    assert_eq!(
        app.store.call("CA801").await.unwrap().from_number,
        DEFAULT_CALLER_ID
    );
    Ok(())
}

#[tokio::test]
async fn outbound_requires_a_known_client() -> Result<()> {
    let app = TestApp::new()?;

    for from in ["client:agent-nobody", "+15559998888"] {
        let response = app
            .post_form(
                "/twiml/outbound",
                &[("CallSid", "CA802"), ("From", from), ("To", CALLEE)],
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        let xml = body_to_string(response.into_body()).await?;
        assert!(xml.contains("an error occurred"));
        assert!(!xml.contains("<Dial"));
    }
    assert!(app.store.calls().await.is_empty());
    Ok(())
}
