// Copyright (C) 2025 Paul Hampson
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License version 3 as  published by the
// Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <https://www.gnu.org/licenses/>.

#![no_std]
#![no_main]

use core::ops::Range;

use assign_resources::assign_resources;
use defmt::{info, warn};
use embassy_embedded_hal::adapter::BlockingAsync;
use embassy_executor::Spawner;
use embassy_rp::flash::{Blocking, Flash};
use embassy_rp::gpio::{Input, Level, Output, Pull};
use embassy_rp::peripherals::UART0;
use embassy_rp::uart::{BufferedInterruptHandler, Config as UartConfig, Uart};
use embassy_rp::{bind_interrupts, peripherals, Peri};
use embassy_time::Delay;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use hazaycargo_scale::application::config::{ScaleConfig, DEFAULT_ID_VERSION};
use hazaycargo_scale::application::controller::ScaleController;
use hazaycargo_scale::link::RadioLink;
use hazaycargo_scale::storage::flash_store::FlashRecordStore;
use hazaycargo_scale::weight::calibration::Calibration;
use hazaycargo_scale::weight::interface::hx711::{Hx711, Hx711Gain};

const FLASH_SIZE: usize = 2 * 1024 * 1024;
/// Last 32 KiB of flash, kept out of the image by memory.x
const RECORD_STORE_RANGE: Range<u32> = (FLASH_SIZE - 32 * 1024) as u32..FLASH_SIZE as u32;

const SERIAL_BAUD: u32 = 115_200;
const HX711_GAIN: u8 = 128;

const ID_VERSION: &str = match option_env!("HAZAY_ID_VERSION") {
    Some(version) => version,
    None => DEFAULT_ID_VERSION,
};

assign_resources! {
    strain_gauge: StrainGaugeResources {
        clk_pin: PIN_4,
        data_pin: PIN_5,
    },
    indicator: IndicatorResources {
        led_pin: PIN_25,
    },
    radio: RadioResources {
        uart: UART0,
        tx_pin: PIN_0,
        rx_pin: PIN_1,
        mode_pin: PIN_15,
    },
    storage: StorageResources {
        flash: FLASH,
    },
}

bind_interrupts!(struct Irqs {
    UART0_IRQ => BufferedInterruptHandler<UART0>;
});

static TX_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

#[embassy_executor::main]
async fn main(_spawner: Spawner) -> ! {
    let p = embassy_rp::init(Default::default());
    let r = split_resources!(p);

    info!("HazayCargo scale {} starting", env!("CARGO_PKG_VERSION"));

    let config = match ScaleConfig::new(ID_VERSION) {
        Ok(config) => config,
        Err(e) => defmt::panic!("Bad controller id version {}: {}", ID_VERSION, e),
    };
    let gain = match Hx711Gain::try_from(HX711_GAIN) {
        Ok(gain) => gain,
        Err(e) => defmt::panic!("Unsupported HX711 gain: {}", e),
    };

    let mut uart_config = UartConfig::default();
    uart_config.baudrate = SERIAL_BAUD;
    let tx_buf = TX_BUF.init([0u8; 256]);
    let rx_buf = RX_BUF.init([0u8; 256]);
    let uart = Uart::new_blocking(r.radio.uart, r.radio.tx_pin, r.radio.rx_pin, uart_config)
        .into_buffered(Irqs, tx_buf, rx_buf);

    let mut radio_link = RadioLink::new(uart, Input::new(r.radio.mode_pin, Pull::Up), Delay);
    if let Err(e) = radio_link.configure(config.controller_id.as_str()).await {
        warn!("Radio bridge setup failed: {}", e);
    }
    let (uart, _mode_pin, _) = radio_link.release();

    let strain_gauge = Hx711::new(
        Output::new(r.strain_gauge.clk_pin, Level::Low),
        Input::new(r.strain_gauge.data_pin, Pull::Up),
        Delay,
        gain,
    );
    let calibration = match Calibration::new(strain_gauge).await {
        Ok(calibration) => calibration,
        Err(e) => defmt::panic!("HX711 start up failed: {}", e),
    };

    let flash = Flash::<_, Blocking, FLASH_SIZE>::new_blocking(r.storage.flash);
    let store = FlashRecordStore::new(BlockingAsync::new(flash), RECORD_STORE_RANGE);

    let led = Output::new(r.indicator.led_pin, Level::Low);

    let controller =
        match ScaleController::initialize(calibration, store, uart, led, Delay, config).await {
            Ok(controller) => controller,
            Err(e) => defmt::panic!("Boot calibration failed: {}", e),
        };
    controller.run().await
}
