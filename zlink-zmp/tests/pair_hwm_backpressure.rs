//! End-to-end PAIR↔PAIR integration test covering send-side high-water-mark
//! backpressure: a small `send_hwm` blocks further sends with `WouldBlock`
//! once exhausted, and draining the peer's queue (which triggers the
//! ACTIVATE-WRITE credit frame) frees slots for subsequent sends.

use bytes::Bytes;
use compio::net::{TcpListener, TcpStream};
use std::io;
use zlink_core::options::SocketOptions;
use zlink_zmp::config::BufferConfig;
use zlink_zmp::PairSocket;

#[compio::test]
async fn pair_send_hwm_blocks_until_peer_drains() {
    const HWM: usize = 4;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server_task = compio::runtime::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut server = PairSocket::from_tcp(stream).await.unwrap();

        for i in 0..HWM {
            let msg = server.recv().await.unwrap().expect("queued message");
            assert_eq!(msg, vec![Bytes::from(format!("msg-{i}"))]);
        }

        // Draining above sent one ACTIVATE-WRITE credit per message back to
        // the client; the reply below is what the client's next recv()
        // blocks on while those credits are processed.
        server.send(vec![Bytes::from_static(b"ack")]).await.unwrap();

        let last = server.recv().await.unwrap().expect("fifth message");
        assert_eq!(last, vec![Bytes::from_static(b"msg-4")]);
    });

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut client = PairSocket::from_tcp_with_options(
        stream,
        BufferConfig::default(),
        SocketOptions::default().with_send_hwm(HWM),
    )
    .await
    .unwrap();

    for i in 0..HWM {
        client
            .send(vec![Bytes::from(format!("msg-{i}"))])
            .await
            .unwrap();
    }

    let err = client
        .send(vec![Bytes::from_static(b"msg-4")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::WouldBlock);

    let reply = client.recv().await.unwrap().expect("ack from peer");
    assert_eq!(reply, vec![Bytes::from_static(b"ack")]);

    client
        .send(vec![Bytes::from_static(b"msg-4")])
        .await
        .expect("send slot freed after peer drained its queue");

    server_task.await.unwrap();
}
