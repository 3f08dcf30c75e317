//! End-to-end ROUTER↔multi-DEALER integration test: several DEALER clients
//! connect to one ROUTER, each is assigned a distinct routing id, and the
//! ROUTER can address a reply back to any one of them specifically.

use bytes::Bytes;
use zlink_zmp::dealer::DealerSocket;
use zlink_zmp::router::RouterSocket;

#[compio::test]
async fn router_fans_in_multiple_dealers_with_distinct_identities() {
    const N: usize = 3;

    let mut router = RouterSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = match router.last_endpoint().unwrap() {
        zlink_core::endpoint::Endpoint::Tcp(a) => *a,
        _ => panic!("expected a tcp endpoint"),
    };

    let mut clients = Vec::new();
    for i in 0..N {
        let mut client = DealerSocket::connect(addr).await.unwrap();
        client
            .send(vec![Bytes::from(format!("hello from {i}"))])
            .await
            .unwrap();
        clients.push(client);
    }

    // Collect N inbound envelopes, each tagged [identity, delimiter, payload].
    let mut seen_identities = std::collections::HashSet::new();
    let mut envelopes = Vec::new();
    for _ in 0..N {
        let msg = router.recv().await.unwrap().expect("dealer message");
        assert_eq!(msg.len(), 3, "expected [identity, delimiter, payload]");
        assert_eq!(msg[1], Bytes::new(), "second frame must be the delimiter");
        assert!(
            seen_identities.insert(msg[0].clone()),
            "each connected DEALER must get a distinct routing id"
        );
        envelopes.push(msg);
    }
    assert_eq!(seen_identities.len(), N);
    assert_eq!(router.peer_count(), N);

    // Reply to each peer individually, addressed by its own identity, and
    // verify the right DEALER gets the right reply.
    for envelope in &envelopes {
        let identity = envelope[0].clone();
        let payload = envelope[2].clone();
        let reply = Bytes::from(format!("echo:{}", String::from_utf8_lossy(&payload)));
        router
            .send(vec![identity, Bytes::new(), reply])
            .await
            .unwrap();
    }

    for (i, client) in clients.iter_mut().enumerate() {
        let reply = client.recv().await.unwrap().expect("router reply");
        assert_eq!(
            reply,
            vec![Bytes::from(format!("echo:hello from {i}"))],
            "reply must route back to the originating DEALER"
        );
    }
}
