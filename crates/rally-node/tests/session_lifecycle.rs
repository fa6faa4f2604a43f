//! Integration tests for hosting, joining and stopping through `SessionNode`.
//!
//! Transports are recording mocks and the lobby directory is the in-process
//! one, so these run without touching the network.

use std::sync::Arc;

use rally_core::{ConnectDescriptor, ConnectionState, Operation, SessionError, SessionMode};
use rally_node::infrastructure::lobby::memory::InMemoryLobbyService;
use rally_node::infrastructure::lobby::{LobbyDiscovery, LobbyService, META_HOST, META_NAME};
use rally_node::infrastructure::network::interfaces::StaticInterfaces;
use rally_node::infrastructure::storage::config::NodeSettings;
use rally_node::infrastructure::transport::mock::{ConnectBehavior, MockTransport};
use rally_node::{SessionNode, SessionNodeBuilder};
use tokio_test::{assert_ok, assert_pending, assert_ready_eq};

struct Fixture {
    node: SessionNode,
    tcp: Arc<MockTransport>,
    relay: Arc<MockTransport>,
    lobbies: Arc<InMemoryLobbyService>,
}

fn fixture() -> Fixture {
    let tcp = Arc::new(MockTransport::lan("tcp"));
    let relay = Arc::new(MockTransport::lobby("relay"));
    let lobbies = Arc::new(InMemoryLobbyService::new());
    let node = SessionNodeBuilder::new(NodeSettings::default())
        .backend(tcp.clone())
        .backend(relay.clone())
        .lobby_service(lobbies.clone())
        .interfaces(Arc::new(StaticInterfaces::none()))
        .host_token("host-abc")
        .build()
        .expect("default settings are valid");
    Fixture {
        node,
        tcp,
        relay,
        lobbies,
    }
}

#[tokio::test]
async fn test_host_twice_without_stop_is_rejected() {
    // Arrange
    let f = fixture();
    assert_ok!(f.node.host(SessionMode::LocalNetwork).await);

    // Act
    let second = f.node.host(SessionMode::LocalNetwork).await;

    // Assert
    assert_eq!(
        second,
        Err(SessionError::InvalidStateTransition {
            operation: Operation::Host,
            state: ConnectionState::Hosting,
        })
    );
    assert_eq!(f.node.state(), ConnectionState::Hosting);
    assert_eq!(f.tcp.listens(), 1);
}

#[tokio::test]
async fn test_join_lobby_session_without_lobby_backend_is_unavailable() {
    // Arrange: only a plain TCP backend is registered.
    let node = SessionNodeBuilder::new(NodeSettings::default())
        .backend(Arc::new(MockTransport::lan("tcp")))
        .interfaces(Arc::new(StaticInterfaces::none()))
        .build()
        .unwrap();

    // Act
    let result = node
        .join(&ConnectDescriptor::LobbyToken("host-xyz".to_string()))
        .await;

    // Assert
    assert_eq!(
        result,
        Err(SessionError::TransportUnavailable {
            mode: SessionMode::LobbyService
        })
    );
    assert_eq!(node.state(), ConnectionState::Idle);
}

#[tokio::test]
async fn test_lobby_hosting_handle_lifecycle() {
    // Arrange
    let f = fixture();

    // Act / Assert: hosting creates a valid handle
    f.node.host(SessionMode::LobbyService).await.expect("host");
    let handle = f.node.lobby_handle().await;
    assert!(handle.valid);
    let lobby = handle.id.expect("lobby id");
    let metadata = f.lobbies.metadata(lobby).expect("lobby exists");
    assert_eq!(metadata.get(META_HOST).map(String::as_str), Some("host-abc"));
    assert_eq!(
        metadata.get(META_NAME),
        Some(&f.node.settings().node.display_name)
    );
    assert!(f.relay.is_active());

    // stop invalidates the handle and removes the lobby
    f.node.stop().await;
    assert!(!f.node.lobby_handle().await.valid);
    assert_eq!(f.lobbies.lobby_count(), 0);

    // a second stop is a no-op
    f.node.stop().await;
    assert_eq!(f.node.state(), ConnectionState::Idle);
    assert_eq!(f.relay.shutdowns(), 1);
}

#[tokio::test]
async fn test_lobby_hosting_survives_unavailable_service() {
    let f = fixture();
    f.lobbies.set_available(false);

    f.node
        .host(SessionMode::LobbyService)
        .await
        .expect("hosting proceeds without advertisement");

    assert_eq!(f.node.state(), ConnectionState::Hosting);
    assert!(!f.node.lobby_handle().await.valid);
    f.node.stop().await;
}

#[tokio::test]
async fn test_transport_loss_tears_down_lobby() {
    let f = fixture();
    f.node.host(SessionMode::LobbyService).await.unwrap();
    assert_eq!(f.lobbies.lobby_count(), 1);

    f.node.controller().report_transport_lost().await;

    assert_eq!(f.node.state(), ConnectionState::Idle);
    assert_eq!(f.lobbies.lobby_count(), 0);
}

#[tokio::test]
async fn test_destroy_lobby_without_owned_lobby_succeeds() {
    let service: Arc<dyn LobbyService> = Arc::new(InMemoryLobbyService::new());
    let lobby = LobbyDiscovery::new(
        Some(service),
        rally_core::HandshakeTag::from_app_name("rally"),
        "host",
    );

    assert!(lobby.destroy_lobby().await);
    assert!(!lobby.lobby_handle().await.valid);
}

#[tokio::test]
async fn test_join_discovered_endpoint_then_stop() {
    let f = fixture();
    let target = ConnectDescriptor::Endpoint("192.168.1.40:7777".parse().unwrap());

    f.node.join(&target).await.expect("join");
    assert_eq!(f.node.state(), ConnectionState::Connected);
    assert_eq!(f.tcp.connects(), vec![target]);

    f.node.stop().await;
    assert_eq!(f.node.state(), ConnectionState::Idle);
}

#[tokio::test]
async fn test_mode_switch_after_stop_changes_active_backend() {
    let f = fixture();
    f.node.host(SessionMode::LocalNetwork).await.unwrap();
    f.node.stop().await;

    f.node.host(SessionMode::LobbyService).await.unwrap();

    assert!(f.relay.is_active());
    assert!(!f.tcp.is_active());
    f.node.stop().await;
}

#[tokio::test]
async fn test_stop_cancels_join_mid_connecting() {
    // Arrange: the backend never answers the connect call.
    let node = SessionNodeBuilder::new(NodeSettings::default())
        .backend(Arc::new(
            MockTransport::lan("tcp").with_connect(ConnectBehavior::Hang),
        ))
        .interfaces(Arc::new(StaticInterfaces::none()))
        .build()
        .unwrap();
    let target = ConnectDescriptor::Endpoint("192.168.1.40:7777".parse().unwrap());
    let mut join = tokio_test::task::spawn(node.join(&target));
    assert_pending!(join.poll());
    assert_eq!(node.state(), ConnectionState::Connecting);

    // Act
    node.stop().await;

    // Assert
    assert!(join.is_woken());
    assert_ready_eq!(join.poll(), Err(SessionError::Cancelled));
    assert_eq!(node.state(), ConnectionState::Idle);
}
