mod harness;

use std::borrow::Cow;

use harness::{page, Guest, VBASE};
use vmem_access::{MachineConfig, MemoryError};
use vmem_mmu::PAGE_SIZE;

#[test]
fn string_at_end_of_page_needs_no_copy() -> anyhow::Result<()> {
    let mut g = Guest::new(1)?;
    g.poke(PAGE_SIZE - 3, b"hi\0");
    let expected = g.peek(PAGE_SIZE - 3, 1).as_ptr();

    let s = g.machine.load_str(page(1) - 3)?.expect("string");
    assert_eq!(s.to_bytes(), b"hi");
    assert_eq!(s.as_ptr().cast::<u8>(), expected);
    assert!(g.machine.temps().is_empty());
    Ok(())
}

#[test]
fn string_split_by_boundary_is_copied() -> anyhow::Result<()> {
    let mut g = Guest::new(2)?;
    g.poke(PAGE_SIZE - 2, b"hi\0");

    let s = g.machine.load_str(page(1) - 2)?.expect("string");
    assert_eq!(s.to_bytes(), b"hi");
    assert_eq!(g.machine.temps().len(), 1);
    assert_eq!(g.machine.drain_temps(), 1);
    Ok(())
}

#[test]
fn temps_exhaustion_is_an_error() -> anyhow::Result<()> {
    let mut g = Guest::with_config(
        2,
        MachineConfig {
            ram_size_bytes: harness::RAM_SIZE,
            temp_capacity: 1,
            ..Default::default()
        },
    )?;
    g.poke(PAGE_SIZE - 1, b"x\0");

    assert!(g.machine.load_str(page(1) - 1)?.is_some());
    assert!(matches!(
        g.machine.load_str(page(1) - 1),
        Err(MemoryError::TempsExhausted { capacity: 1, .. })
    ));
    Ok(())
}

#[test]
fn buffer_past_a_page_is_gathered() -> anyhow::Result<()> {
    let mut g = Guest::new(3)?;
    let image: Vec<u8> = (0..3 * PAGE_SIZE).map(|i| (i * 13 % 256) as u8).collect();
    g.poke(0, &image);

    let size = PAGE_SIZE + 10;
    let buf = g.machine.load_buf(VBASE + 4090, size)?.expect("buffer");
    assert!(matches!(buf, Cow::Owned(_)));
    assert_eq!(&*buf, &image[4090..4090 + size]);
    Ok(())
}

#[test]
fn null_and_unmapped_yield_nothing() -> anyhow::Result<()> {
    let mut g = Guest::new(1)?;
    assert!(g.machine.load_str(0)?.is_none());
    assert!(g.machine.load_buf(0, 8)?.is_none());
    assert!(g.machine.load_buf(page(1) - 4, 8)?.is_none());
    Ok(())
}
