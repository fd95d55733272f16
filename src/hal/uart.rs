//! ESP-IDF UART driver wrapper.
//!
//! Installs the driver with an event queue and exposes the two halves the
//! bridge needs: an event-driven receive half and a blocking transmit half.
//! The driver stays installed for the life of the process; nothing here
//! uninstalls it.

use core::ffi::c_void;
use core::mem::MaybeUninit;

use esp_idf_svc::hal::delay::BLOCK;
use esp_idf_svc::sys::{
    esp, uart_driver_install, uart_event_t, uart_event_type_t_UART_BUFFER_FULL,
    uart_event_type_t_UART_DATA, uart_event_type_t_UART_FIFO_OVF, uart_flush_input,
    uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE, uart_parity_t_UART_PARITY_DISABLE,
    uart_read_bytes, uart_set_baudrate, uart_set_hw_flow_ctrl, uart_set_parity, uart_set_pin,
    uart_set_stop_bits, uart_set_word_length, uart_stop_bits_t_UART_STOP_BITS_1,
    uart_word_length_t_UART_DATA_8_BITS, uart_write_bytes, xQueueGenericReset, xQueueReceive,
    EspError, QueueHandle_t,
};

use crate::config::UartSetup;
use crate::driver::{SerialError, SerialRx, SerialTx};
use crate::event::SerialEvent;

const PIN_NO_CHANGE: i32 = -1;

/// Receive half: owns the driver's event queue.
pub struct EspSerialRx {
    port: u32,
    queue: QueueHandle_t,
}

// SAFETY: FreeRTOS queue handles may be used from any task; the receive
// half moves to the bridge task whole and is never shared.
unsafe impl Send for EspSerialRx {}

/// Transmit half: just the port index, the driver serializes writers.
pub struct EspSerialTx {
    port: u32,
}

/// Install the UART driver and split it into its two halves.
///
/// Ring buffers at twice the chunk size in each direction, 8N1, no flow
/// control, explicit pins.
pub fn install(setup: &UartSetup) -> Result<(EspSerialRx, EspSerialTx), EspError> {
    let mut queue: QueueHandle_t = core::ptr::null_mut();
    let buf = setup.buf_size as i32;

    esp!(unsafe {
        uart_driver_install(
            setup.port as _,
            buf * 2,
            buf * 2,
            setup.queue_depth as i32,
            &mut queue,
            0,
        )
    })?;
    esp!(unsafe { uart_set_baudrate(setup.port as _, setup.baud) })?;
    esp!(unsafe { uart_set_word_length(setup.port as _, uart_word_length_t_UART_DATA_8_BITS) })?;
    esp!(unsafe { uart_set_parity(setup.port as _, uart_parity_t_UART_PARITY_DISABLE) })?;
    esp!(unsafe { uart_set_stop_bits(setup.port as _, uart_stop_bits_t_UART_STOP_BITS_1) })?;
    esp!(unsafe {
        uart_set_hw_flow_ctrl(setup.port as _, uart_hw_flowcontrol_t_UART_HW_FLOWCTRL_DISABLE, 0)
    })?;
    esp!(unsafe {
        uart_set_pin(
            setup.port as _,
            setup.tx_pin,
            setup.rx_pin,
            PIN_NO_CHANGE,
            PIN_NO_CHANGE,
        )
    })?;

    Ok((
        EspSerialRx {
            port: setup.port,
            queue,
        },
        EspSerialTx { port: setup.port },
    ))
}

impl SerialRx for EspSerialRx {
    fn next_event(&mut self) -> Option<SerialEvent> {
        let mut event = MaybeUninit::<uart_event_t>::zeroed();
        // SAFETY: the queue was created by uart_driver_install for
        // uart_event_t items; the buffer is exactly one item large.
        let taken =
            unsafe { xQueueReceive(self.queue, event.as_mut_ptr() as *mut c_void, BLOCK) };
        if taken == 0 {
            // Cannot happen with an infinite wait, but stay honest.
            return None;
        }
        // SAFETY: xQueueReceive returned pdTRUE, the item is initialized.
        let event = unsafe { event.assume_init() };

        Some(match event.type_ {
            t if t == uart_event_type_t_UART_DATA => SerialEvent::Data(event.size),
            t if t == uart_event_type_t_UART_FIFO_OVF => SerialEvent::Overflow,
            t if t == uart_event_type_t_UART_BUFFER_FULL => SerialEvent::BufferFull,
            other => SerialEvent::Other(other),
        })
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        // SAFETY: buf outlives the call and the length matches.
        let n = unsafe {
            uart_read_bytes(
                self.port as _,
                buf.as_mut_ptr() as *mut c_void,
                buf.len() as u32,
                BLOCK,
            )
        };
        if n < 0 {
            return Err(SerialError::Driver("uart read failed"));
        }
        Ok(n as usize)
    }

    fn flush_input(&mut self) -> Result<(), SerialError> {
        esp!(unsafe { uart_flush_input(self.port as _) })?;
        Ok(())
    }

    fn reset_events(&mut self) {
        // SAFETY: resetting a live queue is allowed from any task.
        unsafe { xQueueGenericReset(self.queue, 0) };
    }
}

impl SerialTx for EspSerialTx {
    fn write(&mut self, buf: &[u8]) -> Result<usize, SerialError> {
        // Blocks while the driver's TX ring is full.
        // SAFETY: buf outlives the call and the length matches.
        let n = unsafe {
            uart_write_bytes(self.port as _, buf.as_ptr() as *const c_void, buf.len())
        };
        if n < 0 {
            return Err(SerialError::Driver("uart write failed"));
        }
        Ok(n as usize)
    }
}
