//! Binary encoding of axes and sparse indexes, for use by an external index writer.
//!
//! Fixed width numbers are Big Endian. Lengths and counts are unsigned varints.
//!
use std::io;

use async_trait::async_trait;
use futures::{io as aio, AsyncReadExt, AsyncWriteExt};
use unsigned_varint::{
    aio::read_u64 as varint_read_u64,
    encode::{u64 as varint_encode_u64, u64_buffer as varint_u64_buffer},
};

use crate::{
    errors::{Error, Result},
    time::{CalendarDate, TimeField, TimeUnit},
    value::{EnsMember, Interval, Level},
};

/// Upper bound on space reserved up front for a length read from a stream. Longer sequences
/// still decode, growing as items arrive.
///
pub(crate) const MAX_PREALLOC: usize = 1 << 16;

#[async_trait]
pub trait Serialize: Sized {
    /// Write self to a stream
    async fn write_to(&self, stream: &mut (impl aio::AsyncWrite + Unpin + Send)) -> Result<()>;

    /// Read Self from a stream
    async fn read_from(stream: &mut (impl aio::AsyncRead + Unpin + Send)) -> Result<Self>;
}

#[async_trait]
pub(crate) trait ExtendedAsyncRead: aio::AsyncRead {
    /// Read a byte from a stream
    async fn read_byte(&mut self) -> io::Result<u8>;

    /// Read a Big Endian encoded 32 bit signed integer from a stream
    async fn read_i32(&mut self) -> io::Result<i32>;

    /// Read a Big Endian encoded 32 bit unsigned integer from a stream
    async fn read_u32(&mut self) -> io::Result<u32>;

    /// Read a Big Endian encoded 64 bit signed integer from a stream
    async fn read_i64(&mut self) -> io::Result<i64>;

    /// Read a Big Endian encoded 64 bit float from a stream
    async fn read_f64(&mut self) -> io::Result<f64>;

    /// Read an unsigned varint from a stream
    async fn read_varint(&mut self) -> Result<usize>;

    /// Read a varint length prefixed UTF-8 string from a stream
    async fn read_string(&mut self) -> Result<String>;
}

#[async_trait]
impl<R: aio::AsyncRead + Unpin + Send> ExtendedAsyncRead for R {
    async fn read_byte(&mut self) -> io::Result<u8> {
        let mut buffer = [0; 1];
        self.read_exact(&mut buffer).await?;

        Ok(buffer[0])
    }

    async fn read_i32(&mut self) -> io::Result<i32> {
        let mut buffer = [0; 4];
        self.read_exact(&mut buffer).await?;

        Ok(i32::from_be_bytes(buffer))
    }

    async fn read_u32(&mut self) -> io::Result<u32> {
        let mut buffer = [0; 4];
        self.read_exact(&mut buffer).await?;

        Ok(u32::from_be_bytes(buffer))
    }

    async fn read_i64(&mut self) -> io::Result<i64> {
        let mut buffer = [0; 8];
        self.read_exact(&mut buffer).await?;

        Ok(i64::from_be_bytes(buffer))
    }

    async fn read_f64(&mut self) -> io::Result<f64> {
        let mut buffer = [0; 8];
        self.read_exact(&mut buffer).await?;

        Ok(f64::from_be_bytes(buffer))
    }

    async fn read_varint(&mut self) -> Result<usize> {
        Ok(varint_read_u64(&mut *self).await? as usize)
    }

    async fn read_string(&mut self) -> Result<String> {
        let len = self.read_varint().await?;
        let mut bytes = Vec::with_capacity(len.min(MAX_PREALLOC));
        (&mut *self).take(len as u64).read_to_end(&mut bytes).await?;
        if bytes.len() < len {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }

        String::from_utf8(bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err).into())
    }
}

#[async_trait]
pub(crate) trait ExtendedAsyncWrite: aio::AsyncWrite {
    /// Write a byte to a stream
    async fn write_byte(&mut self, byte: u8) -> io::Result<()>;

    /// Write a Big Endian encoded 32 bit signed integer to a stream
    async fn write_i32(&mut self, word: i32) -> io::Result<()>;

    /// Write a Big Endian encoded 32 bit unsigned integer to a stream
    async fn write_u32(&mut self, word: u32) -> io::Result<()>;

    /// Write a Big Endian encoded 64 bit signed integer to a stream
    async fn write_i64(&mut self, word: i64) -> io::Result<()>;

    /// Write a Big Endian encoded 64 bit float to a stream
    async fn write_f64(&mut self, word: f64) -> io::Result<()>;

    /// Write an unsigned varint to a stream
    async fn write_varint(&mut self, value: usize) -> io::Result<()>;

    /// Write a varint length prefixed UTF-8 string to a stream
    async fn write_str(&mut self, value: &str) -> io::Result<()>;
}

#[async_trait]
impl<W: aio::AsyncWrite + Unpin + Send> ExtendedAsyncWrite for W {
    async fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        let buffer = [byte];
        self.write_all(&buffer).await?;

        Ok(())
    }

    async fn write_i32(&mut self, word: i32) -> io::Result<()> {
        let buffer = word.to_be_bytes();
        self.write_all(&buffer).await?;

        Ok(())
    }

    async fn write_u32(&mut self, word: u32) -> io::Result<()> {
        let buffer = word.to_be_bytes();
        self.write_all(&buffer).await?;

        Ok(())
    }

    async fn write_i64(&mut self, word: i64) -> io::Result<()> {
        let buffer = word.to_be_bytes();
        self.write_all(&buffer).await?;

        Ok(())
    }

    async fn write_f64(&mut self, word: f64) -> io::Result<()> {
        let buffer = word.to_be_bytes();
        self.write_all(&buffer).await?;

        Ok(())
    }

    async fn write_varint(&mut self, value: usize) -> io::Result<()> {
        let mut buffer = varint_u64_buffer();
        let encoded = varint_encode_u64(value as u64, &mut buffer);
        self.write_all(encoded).await?;

        Ok(())
    }

    async fn write_str(&mut self, value: &str) -> io::Result<()> {
        self.write_varint(value.len()).await?;
        self.write_all(value.as_bytes()).await?;

        Ok(())
    }
}

/// Write a varint count followed by each item.
///
pub(crate) async fn write_seq<T>(
    stream: &mut (impl aio::AsyncWrite + Unpin + Send),
    items: &[T],
) -> Result<()>
where
    T: Serialize + Sync,
{
    stream.write_varint(items.len()).await?;
    for item in items {
        item.write_to(stream).await?;
    }

    Ok(())
}

/// Read a varint count followed by that many items.
///
pub(crate) async fn read_seq<T>(stream: &mut (impl aio::AsyncRead + Unpin + Send)) -> Result<Vec<T>>
where
    T: Serialize,
{
    let len = stream.read_varint().await?;
    let mut items = Vec::with_capacity(len.min(MAX_PREALLOC));
    for _ in 0..len {
        items.push(T::read_from(stream).await?);
    }

    Ok(items)
}

/// Record references, such as file positions, are written as varints.
///
#[async_trait]
impl Serialize for u64 {
    async fn write_to(&self, stream: &mut (impl aio::AsyncWrite + Unpin + Send)) -> Result<()> {
        stream.write_varint(*self as usize).await?;

        Ok(())
    }

    async fn read_from(stream: &mut (impl aio::AsyncRead + Unpin + Send)) -> Result<Self> {
        Ok(stream.read_varint().await? as u64)
    }
}

#[async_trait]
impl Serialize for i32 {
    async fn write_to(&self, stream: &mut (impl aio::AsyncWrite + Unpin + Send)) -> Result<()> {
        stream.write_i32(*self).await?;

        Ok(())
    }

    async fn read_from(stream: &mut (impl aio::AsyncRead + Unpin + Send)) -> Result<Self> {
        Ok(stream.read_i32().await?)
    }
}

#[async_trait]
impl Serialize for CalendarDate {
    async fn write_to(&self, stream: &mut (impl aio::AsyncWrite + Unpin + Send)) -> Result<()> {
        stream.write_i64(self.millis()).await?;

        Ok(())
    }

    async fn read_from(stream: &mut (impl aio::AsyncRead + Unpin + Send)) -> Result<Self> {
        Ok(CalendarDate::from_millis(stream.read_i64().await?))
    }
}

#[async_trait]
impl Serialize for TimeUnit {
    async fn write_to(&self, stream: &mut (impl aio::AsyncWrite + Unpin + Send)) -> Result<()> {
        stream.write_byte(self.field().tag()).await?;
        stream.write_i32(self.multiplier()).await?;

        Ok(())
    }

    async fn read_from(stream: &mut (impl aio::AsyncRead + Unpin + Send)) -> Result<Self> {
        let tag = stream.read_byte().await?;
        let field = TimeField::from_tag(tag).ok_or(Error::BadTag(tag))?;
        let multiplier = stream.read_i32().await?;

        Ok(TimeUnit::new(field, multiplier))
    }
}

#[async_trait]
impl Serialize for Interval {
    async fn write_to(&self, stream: &mut (impl aio::AsyncWrite + Unpin + Send)) -> Result<()> {
        stream.write_i32(self.start).await?;
        stream.write_i32(self.end).await?;

        Ok(())
    }

    async fn read_from(stream: &mut (impl aio::AsyncRead + Unpin + Send)) -> Result<Self> {
        let start = stream.read_i32().await?;
        let end = stream.read_i32().await?;

        Ok(Interval::new(start, end))
    }
}

#[async_trait]
impl Serialize for Level {
    async fn write_to(&self, stream: &mut (impl aio::AsyncWrite + Unpin + Send)) -> Result<()> {
        stream.write_byte(self.is_layer as u8).await?;
        stream.write_f64(self.value1).await?;
        stream.write_f64(self.value2).await?;

        Ok(())
    }

    async fn read_from(stream: &mut (impl aio::AsyncRead + Unpin + Send)) -> Result<Self> {
        let is_layer = stream.read_byte().await? != 0;
        let value1 = stream.read_f64().await?;
        let value2 = stream.read_f64().await?;

        Ok(Level {
            value1,
            value2,
            is_layer,
        })
    }
}

#[async_trait]
impl Serialize for EnsMember {
    async fn write_to(&self, stream: &mut (impl aio::AsyncWrite + Unpin + Send)) -> Result<()> {
        stream.write_i32(self.code).await?;
        stream.write_i32(self.number).await?;

        Ok(())
    }

    async fn read_from(stream: &mut (impl aio::AsyncRead + Unpin + Send)) -> Result<Self> {
        let code = stream.read_i32().await?;
        let number = stream.read_i32().await?;

        Ok(EnsMember::new(code, number))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::io::Cursor;

    #[tokio::test]
    async fn test_all_of_it() -> Result<()> {
        let mut buffer: Vec<u8> = Vec::new();
        buffer.write_byte(42).await?;
        buffer.write_u32(31441968).await?;
        buffer.write_i32(-31441968).await?;
        buffer.write_i64(-1_700_000_000_000).await?;
        buffer.write_f64(6.283184).await?;
        buffer.write_varint(300).await?;
        buffer.write_str("Pa").await?;

        let mut buffer = Cursor::new(buffer);
        assert_eq!(buffer.read_byte().await?, 42);
        assert_eq!(buffer.read_u32().await?, 31441968);
        assert_eq!(buffer.read_i32().await?, -31441968);
        assert_eq!(buffer.read_i64().await?, -1_700_000_000_000);
        assert_eq!(buffer.read_f64().await?, 6.283184);
        assert_eq!(buffer.read_varint().await?, 300);
        assert_eq!(buffer.read_string().await?, "Pa");

        Ok(())
    }

    #[tokio::test]
    async fn test_values() -> Result<()> {
        let unit = TimeUnit::hours(6);
        let layer = Level::layer(1000.0, 850.0);
        let level = Level::new(500.0);
        let member = EnsMember::new(3, 12);

        let mut buffer: Vec<u8> = Vec::new();
        unit.write_to(&mut buffer).await?;
        layer.write_to(&mut buffer).await?;
        level.write_to(&mut buffer).await?;
        member.write_to(&mut buffer).await?;
        write_seq(&mut buffer, &[Interval::new(0, 6), Interval::new(6, 12)]).await?;

        let mut buffer = Cursor::new(buffer);
        assert_eq!(TimeUnit::read_from(&mut buffer).await?, unit);
        assert_eq!(Level::read_from(&mut buffer).await?, layer);
        assert_eq!(Level::read_from(&mut buffer).await?, level);
        assert_eq!(EnsMember::read_from(&mut buffer).await?, member);
        assert_eq!(
            read_seq::<Interval>(&mut buffer).await?,
            vec![Interval::new(0, 6), Interval::new(6, 12)]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_truncated_lengths() -> Result<()> {
        let mut buffer: Vec<u8> = Vec::new();
        buffer.write_varint(1 << 60).await?;
        buffer.write_u32(7).await?;
        assert!(matches!(
            read_seq::<i32>(&mut Cursor::new(buffer.clone())).await,
            Err(Error::IO(_))
        ));
        assert!(matches!(
            Cursor::new(buffer).read_string().await,
            Err(Error::IO(_))
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_bad_time_field() {
        let mut buffer = Cursor::new(vec![9_u8, 0, 0, 0, 1]);
        assert!(matches!(
            TimeUnit::read_from(&mut buffer).await,
            Err(Error::BadTag(9))
        ));
    }
}
