// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Command server wired to the real network manager, calibration storage and frame
//! transfer.

mod common;

use std::cell::RefCell;
use std::net::Ipv4Addr;

use vision_addon::command::{
    Camera, Capabilities, CommandServer, Fps, Pipeline, PipelineInput, PipelineOutput,
};
use vision_addon::config::{FRAME_TARGET, FrameTransferConfig, layout};
use vision_addon::frame::FrameTransfer;
use vision_addon::network::{MacAddress, NetworkConfiguration, NetworkManager};
use vision_addon::storage::{MemoryStorage, RetryingStorage, SharedStorage, Storage};
use vision_addon::transport::Protocol;
use vision_addon::{Result, Runnable};

use common::{Interface, NoDelay, RecordingConnector, ScriptedListener, init_logging};

/// Camera and pipeline which accept everything
#[derive(Default)]
struct Board {
    threshold: Option<u8>,
    fps: Option<Fps>,
}

impl Camera for Board {
    fn request_capture(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_whitebalance(&mut self, _red: u16, _green: u16, _blue: u16) -> Result<()> {
        Ok(())
    }

    fn set_exposure(&mut self, _integer: u16, _fraction: u8) -> Result<()> {
        Ok(())
    }

    fn set_gain(&mut self, _level: u8, _band: u8) -> Result<()> {
        Ok(())
    }

    fn set_fps(&mut self, fps: Fps) -> Result<()> {
        self.fps = Some(fps);
        Ok(())
    }
}

impl Pipeline for Board {
    fn set_input(&mut self, _input: PipelineInput) -> Result<()> {
        Ok(())
    }

    fn set_output(&mut self, _output: PipelineOutput) -> Result<()> {
        Ok(())
    }

    fn set_binarization_threshold(&mut self, threshold: u8) -> Result<()> {
        self.threshold = Some(threshold);
        Ok(())
    }

    fn enable_strobe_pulse(&mut self, _enable: bool) -> Result<()> {
        Ok(())
    }

    fn set_strobe_on_delay(&mut self, _cycles: u32) -> Result<()> {
        Ok(())
    }

    fn set_strobe_hold_time(&mut self, _cycles: u32) -> Result<()> {
        Ok(())
    }

    fn enable_strobe_constant(&mut self, _enable: bool) -> Result<()> {
        Ok(())
    }
}

fn request(request_id: u8, command_id: u8, payload: &[u8]) -> Vec<u8> {
    let mut bytes = vec![request_id, command_id, 0, payload.len() as u8];
    bytes.extend_from_slice(payload);
    bytes
}

#[test]
fn host_session() {
    init_logging();

    let eeprom = RefCell::new(RetryingStorage::new(MemoryStorage::new(), NoDelay));
    let mut network = NetworkManager::new(
        Interface::default(),
        SharedStorage::new(&eeprom),
        MacAddress::default(),
    );
    let mut calibration = SharedStorage::new(&eeprom);
    let mut camera = Board::default();
    let mut pipeline = Board::default();
    let frame: Vec<u8> = (0..3000u32).map(|i| i as u8).collect();
    let connector = RecordingConnector::default();
    let mut frames = FrameTransfer::new(&frame, connector.clone(), FrameTransferConfig::default());

    let config = NetworkConfiguration {
        mac: MacAddress::new([0x00, 0x80, 0xE1, 0x12, 0x34, 0x56]),
        ip: Ipv4Addr::new(192, 168, 1, 20),
        netmask: Ipv4Addr::new(255, 255, 255, 0),
        gateway: Ipv4Addr::new(192, 168, 1, 1),
    };
    let translation: Vec<u8> = (100..112).collect();

    let mut listener = ScriptedListener::default();
    let exchanges = [
        listener.request(&request(1, 0x52, &[90])),
        listener.request(&request(2, 0x52, &[90, 0])),
        listener.request(&request(3, 0x31, &config.to_bytes())),
        listener.request(&request(4, 0x32, &[])),
        listener.request(&request(5, 0x47, &translation)),
        listener.request(&request(6, 0x46, &[])),
        listener.request(&request(7, 0x21, &[])),
        listener.request(&request(8, 0x25, &[1])),
        listener.request(&[9]),
        listener.request(&request(10, 0x7F, &[])),
    ];

    let capabilities = Capabilities {
        camera: &mut camera,
        pipeline: &mut pipeline,
        network: &mut network,
        storage: &mut calibration,
        frames: &mut frames,
        frame_target: FRAME_TARGET,
    };
    let mut server = CommandServer::new(listener, capabilities);
    for _ in 0..exchanges.len() {
        server.run();
    }
    drop(server);

    let replies: Vec<Vec<u8>> = exchanges.iter().map(|e| e.borrow().reply.clone()).collect();
    assert!(exchanges.iter().all(|e| e.borrow().closed));

    assert_eq!(replies[0], [1, 0x52, 1, 0]);
    assert_eq!(replies[1], [2, 0x52, 0, 0]);
    assert_eq!(replies[2], [3, 0x31, 1, 0]);
    assert_eq!(replies[3], [4, 0x32, 1, 0]);
    assert_eq!(replies[4], [5, 0x47, 1, 0]);
    assert_eq!(&replies[5][..4], &[6, 0x46, 1, 12]);
    assert_eq!(&replies[5][4..], translation.as_slice());
    assert_eq!(replies[6], [7, 0x21, 1, 0]);
    assert_eq!(replies[7], [8, 0x25, 1, 0]);
    assert_eq!(replies[8], [0, 0xFF, 0, 0]);
    assert_eq!(replies[9], [10, 0x7F, 0, 0]);

    assert_eq!(pipeline.threshold, Some(90));
    assert_eq!(camera.fps, Some(Fps::Fps72));

    // Addresses live at once, everything persisted
    assert_eq!(network.ip(), config.ip);
    assert_eq!(network.configuration(), config);
    let mut stored = SharedStorage::new(&eeprom);
    assert_eq!(stored.read_u32(layout::IP).unwrap(), u32::from(config.ip));
    assert_eq!(stored.read_u64(layout::MAC).unwrap(), config.mac.to_u64());

    // Frame went out over TCP in three segments
    let sent = connector.sent.borrow();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].protocol, Protocol::Tcp);
    assert_eq!(sent[0].remote, FRAME_TARGET);
    assert_eq!(sent[0].data, frame);
    assert!(sent[0].closed);
}

#[test]
fn persisted_configuration_survives_reboot() {
    init_logging();

    let mut storage = MemoryStorage::new();
    {
        let mut manager = NetworkManager::new(
            Interface::default(),
            RetryingStorage::new(&mut storage, NoDelay),
            MacAddress::default(),
        );
        manager.set_ip(Ipv4Addr::new(10, 9, 8, 7));
        manager.set_netmask(Ipv4Addr::new(255, 0, 0, 0));
        manager.set_gateway(Ipv4Addr::new(10, 0, 0, 254));
        manager.set_mac(MacAddress::new([2, 4, 6, 8, 10, 12]));
        manager.persist_to_storage().unwrap();
    }

    // Bring-up reads the MAC first, then the manager loads the rest
    let mac = vision_addon::network::load_mac_from_storage(&mut storage).unwrap();
    assert_eq!(mac, MacAddress::new([2, 4, 6, 8, 10, 12]));

    let mut manager = NetworkManager::new(
        Interface::default(),
        RetryingStorage::new(&mut storage, NoDelay),
        mac,
    );
    manager.load_from_storage().unwrap();
    assert_eq!(manager.interface().ip, Ipv4Addr::new(10, 9, 8, 7));
    assert_eq!(manager.netmask(), Ipv4Addr::new(255, 0, 0, 0));
    assert_eq!(manager.gateway(), Ipv4Addr::new(10, 0, 0, 254));
}

#[test]
fn busy_storage_times_out_persist() {
    init_logging();

    let mut storage = MemoryStorage::new();
    storage.set_busy_polls(100);
    let mut manager = NetworkManager::new(
        Interface::default(),
        RetryingStorage::new(&mut storage, NoDelay),
        MacAddress::default(),
    );
    manager.set_ip(Ipv4Addr::new(10, 0, 0, 9));

    assert_eq!(
        manager.persist_to_storage(),
        Err(vision_addon::Error::StorageTimeout)
    );
    // Live configuration untouched by the failure
    assert_eq!(manager.ip(), Ipv4Addr::new(10, 0, 0, 9));
    drop(manager);
    assert_eq!(storage.writes(), 0);
}
