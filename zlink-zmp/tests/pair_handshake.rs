//! End-to-end PAIR↔PAIR integration test over a real TCP loopback
//! connection: handshake, bidirectional send/recv, and peer-close
//! detection.

use bytes::Bytes;
use zlink_zmp::PairSocket;

#[compio::test]
async fn pair_handshake_and_round_trip() {
    let listener = compio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_task = compio::runtime::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut server = PairSocket::from_tcp(stream).await.unwrap();

        let msg = server.recv().await.unwrap().expect("client message");
        assert_eq!(msg, vec![Bytes::from_static(b"ping")]);

        server
            .send(vec![Bytes::from_static(b"pong")])
            .await
            .unwrap();
    });

    let mut client = PairSocket::connect(addr).await.unwrap();
    client.send(vec![Bytes::from_static(b"ping")]).await.unwrap();

    let reply = client.recv().await.unwrap().expect("server reply");
    assert_eq!(reply, vec![Bytes::from_static(b"pong")]);

    server_task.await.unwrap();
}

#[compio::test]
async fn pair_multipart_round_trip() {
    let listener = compio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_task = compio::runtime::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut server = PairSocket::from_tcp(stream).await.unwrap();
        let msg = server.recv().await.unwrap().expect("multipart message");
        msg
    });

    let mut client = PairSocket::connect(addr).await.unwrap();
    client
        .send(vec![
            Bytes::from_static(b"part1"),
            Bytes::from_static(b"part2"),
            Bytes::from_static(b"part3"),
        ])
        .await
        .unwrap();

    let received = server_task.await.unwrap();
    assert_eq!(
        received,
        vec![
            Bytes::from_static(b"part1"),
            Bytes::from_static(b"part2"),
            Bytes::from_static(b"part3"),
        ]
    );
}

#[compio::test]
async fn pair_recv_returns_none_after_peer_closes() {
    let listener = compio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_task = compio::runtime::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let server = PairSocket::from_tcp(stream).await.unwrap();
        // Drop immediately: the client's next recv should observe a clean
        // peer-close rather than an error.
        drop(server);
    });

    let mut client = PairSocket::connect(addr).await.unwrap();
    server_task.await.unwrap();

    let result = client.recv().await;
    assert!(matches!(result, Ok(None)) || result.is_err());
}
