//! End-to-end tests over an in-memory byte channel, with a scripted peer
//! standing in for the radio module.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::time::timeout;

use xbee_api::at::{AtBlocking, AtCommandEngine, BlockingConfig};
use xbee_api::device::{DeviceConfig, XBeeDevice};
use xbee_api::protocol::{encode_frame, RawFrame, RxFrame, RxParser};
use xbee_api::rxtx::{Address, RxPacketBuffer, TxRequest, TxStatus, TxStatusMonitor};
use xbee_api::{ApiId, Param, XBeeError};

fn test_device() -> (XBeeDevice, DuplexStream) {
    let (peer, ours) = duplex(4096);
    let (r, w) = tokio::io::split(ours);
    let config = DeviceConfig {
        guard_period: Duration::from_millis(5),
        command_timeout: Duration::from_millis(500),
        ..DeviceConfig::default()
    };
    (XBeeDevice::with_config(r, w, config), peer)
}

fn fast_blocking(engine: Arc<AtCommandEngine>) -> AtBlocking {
    AtBlocking::with_config(
        engine,
        BlockingConfig {
            timeout: Duration::from_millis(500),
            poll_interval: Duration::from_millis(10),
        },
    )
}

/// Read frames off the peer side of the link.
async fn next_frame(peer: &mut DuplexStream, parser: &mut RxParser) -> RxFrame {
    let mut buf = [0u8; 256];
    loop {
        let n = peer.read(&mut buf).await.expect("peer read");
        if let Some(frame) = parser.push(&buf[..n]).into_iter().next() {
            return frame;
        }
    }
}

async fn send_frame(peer: &mut DuplexStream, id: ApiId, payload: Vec<u8>) {
    let bytes = encode_frame(&RawFrame::new(id, payload), true);
    peer.write_all(&bytes).await.expect("peer write");
}

#[tokio::test]
async fn test_setup_then_query_firmware_version() {
    let (device, mut peer) = test_device();

    // Command-mode handshake, scripted from the module's side.
    let script = tokio::spawn(async move {
        let mut seen = Vec::new();
        for expect in [&b"+++"[..], b"ATAP 2\r", b"ATCN\r"] {
            let mut buf = [0u8; 32];
            while !seen.ends_with(expect) {
                let n = peer.read(&mut buf).await.unwrap();
                seen.extend_from_slice(&buf[..n]);
            }
            peer.write_all(b"OK\r").await.unwrap();
        }
        peer
    });
    device.setup_api_mode().await.unwrap();
    let mut peer = script.await.unwrap();

    let engine = Arc::new(AtCommandEngine::new(device.handle()));
    device.register_decoder(engine.clone()).unwrap();
    let at = fast_blocking(engine);

    let module = tokio::spawn(async move {
        let mut parser = RxParser::new(true);
        let frame = next_frame(&mut peer, &mut parser).await;
        assert_eq!(frame.api_id(), Some(ApiId::AtCommand));
        assert_eq!(frame.payload(), b"1VR");

        send_frame(&mut peer, ApiId::AtResponse, vec![b'1', b'V', b'R', 0x00, 0x10, 0xE8]).await;
        peer
    });

    let version = timeout(Duration::from_secs(2), at.firmware_version())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(version, 0x10E8);

    // A second read is served from the cache, no further frames.
    assert_eq!(at.firmware_version().await.unwrap(), 0x10E8);
    module.await.unwrap();
}

#[tokio::test]
async fn test_blocking_set_confirms_against_readback() {
    let (device, mut peer) = test_device();
    let engine = Arc::new(AtCommandEngine::new(device.handle()));
    device.register_decoder(engine.clone()).unwrap();
    let at = fast_blocking(engine);

    let module = tokio::spawn(async move {
        let mut parser = RxParser::new(true);
        let frame = next_frame(&mut peer, &mut parser).await;
        assert_eq!(frame.payload(), &[b'9', b'I', b'D', 0xBE, 0xEF]);
        send_frame(&mut peer, ApiId::AtResponse, vec![b'9', b'I', b'D', 0x00]).await;
        peer
    });

    timeout(Duration::from_secs(2), at.set_pan_id(0xBEEF))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(at.pan_id().await.unwrap(), 0xBEEF);
    module.await.unwrap();
}

#[tokio::test]
async fn test_device_rejection_reaches_caller() {
    let (device, mut peer) = test_device();
    let engine = Arc::new(AtCommandEngine::new(device.handle()));
    device.register_decoder(engine.clone()).unwrap();
    let at = fast_blocking(engine);

    let module = tokio::spawn(async move {
        let mut parser = RxParser::new(true);
        let _ = next_frame(&mut peer, &mut parser).await;
        send_frame(&mut peer, ApiId::AtResponse, vec![b'4', b'C', b'H', 0x03]).await;
        peer
    });

    let err = timeout(Duration::from_secs(2), at.set_channel(0x42))
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(
        err,
        XBeeError::CommandFailed {
            param: Param::Channel,
            ..
        }
    ));
    module.await.unwrap();
}

#[tokio::test]
async fn test_received_packets_are_buffered_in_order() {
    let (device, mut peer) = test_device();
    let buffer = Arc::new(RxPacketBuffer::new(8));
    device.register_decoder(buffer.clone()).unwrap();

    for (addr, data) in [(0x0001u16, &b"first"[..]), (0x0002, b"second")] {
        let mut payload = addr.to_be_bytes().to_vec();
        payload.push(40); // RSSI
        payload.push(0x00); // options
        payload.extend_from_slice(data);
        send_frame(&mut peer, ApiId::RxPacket16, payload).await;
    }

    timeout(Duration::from_secs(2), async {
        while buffer.len() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let first = buffer.pop().unwrap();
    assert_eq!(first.source, Address::Short(0x0001));
    assert_eq!(first.rssi_dbm, -40);
    assert_eq!(&first.data[..], b"first");

    let second = buffer.pop().unwrap();
    assert_eq!(second.source, Address::Short(0x0002));
    assert_eq!(&second.data[..], b"second");
}

#[tokio::test]
async fn test_transmit_request_and_status_roundtrip() {
    let (device, mut peer) = test_device();
    let monitor = Arc::new(TxStatusMonitor::new());
    device.register_decoder(monitor.clone()).unwrap();

    let request = TxRequest::new(Address::Short(0x5678), &b"ping"[..]).unwrap();
    device.send_frame(&request).await.unwrap();

    let mut parser = RxParser::new(true);
    let frame = next_frame(&mut peer, &mut parser).await;
    assert_eq!(frame.api_id(), Some(ApiId::TxRequest16));
    let payload = frame.payload();
    assert_eq!(&payload[1..3], &[0x56, 0x78]);
    assert_eq!(&payload[4..], b"ping");

    // Acknowledge delivery with a status frame for the same frame id.
    send_frame(&mut peer, ApiId::TxStatus, vec![payload[0], 0x00]).await;

    timeout(Duration::from_secs(2), async {
        while monitor.last().is_none() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(monitor.last(), Some(TxStatus::Ok));
}

#[tokio::test]
async fn test_corrupted_frame_does_not_stall_the_link() {
    let (device, mut peer) = test_device();
    let buffer = Arc::new(RxPacketBuffer::new(8));
    device.register_decoder(buffer.clone()).unwrap();

    // Garbage, then a frame with a bad checksum, then a good packet.
    peer.write_all(&[0x00, 0x13, 0x37]).await.unwrap();
    let mut corrupt = encode_frame(
        &RawFrame::new(ApiId::RxPacket16, vec![0x00, 0x01, 40, 0, b'x']),
        true,
    );
    let last = corrupt.len() - 1;
    corrupt[last] ^= 0xFF;
    peer.write_all(&corrupt).await.unwrap();
    send_frame(&mut peer, ApiId::RxPacket16, vec![0x00, 0x09, 35, 0, b'o', b'k']).await;

    timeout(Duration::from_secs(2), async {
        while buffer.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let packet = buffer.pop().unwrap();
    assert_eq!(packet.source, Address::Short(0x0009));
    assert_eq!(&packet.data[..], b"ok");
    assert!(buffer.is_empty(), "corrupt frame must not surface");
}
